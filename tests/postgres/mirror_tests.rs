//! `PostgreSQL` integration tests for the lifecycle mirror.

use chrono::{DateTime, TimeZone, Utc};
use mockable::DefaultClock;
use rstest::rstest;
use stagegate::lifecycle::{
    adapters::memory::InMemoryManifestStore,
    domain::{
        EpicId, EpicManifest, GateOutcome, GateRecord, GateRow, PipelineRow, PipelineStatus, Stage,
        StageRow, StageStatus, gate_row_id, pipeline_row_id, stage_row_id,
    },
    ports::{LifecycleMirror, ManifestStore},
    services::MirrorSynchronizer,
};
use std::sync::Arc;

use crate::postgres::helpers::{BoxError, PreparedMirror, prepared_mirror};

fn at(hour: u32) -> Result<DateTime<Utc>, BoxError> {
    Utc.with_ymd_and_hms(2026, 10, 19, hour, 0, 0)
        .single()
        .ok_or_else(|| "invalid timestamp".into())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_upserts_leave_one_row_per_key(
    #[future] prepared_mirror: Result<PreparedMirror, BoxError>,
) -> Result<(), BoxError> {
    let PreparedMirror {
        mirror,
        temp_db: _temp_db,
    } = prepared_mirror.await?;
    let epic_id = EpicId::new("E7")?;

    let mut pipeline = PipelineRow::stub(&epic_id, at(8)?);
    mirror.upsert_pipeline(&pipeline).await?;
    pipeline.current_stage = Stage::Specification;
    pipeline.status = PipelineStatus::Blocked;
    pipeline.transition_count = 2;
    pipeline.revision = 3;
    pipeline.updated_at = at(9)?;
    mirror.upsert_pipeline(&pipeline).await?;
    assert_eq!(mirror.list_pipelines().await?, vec![pipeline.clone()]);

    let mut stage = StageRow::stub(&epic_id, Stage::Testing);
    mirror.upsert_stage(&stage).await?;
    stage.status = StageStatus::InProgress;
    stage.started_at = Some(at(9)?);
    stage.assigned_agent = Some("qa-agent".to_owned());
    stage.artifacts = vec!["report.md".to_owned()];
    mirror.upsert_stage(&stage).await?;
    assert_eq!(mirror.find_stages(&pipeline.id).await?, vec![stage.clone()]);

    let mut gate = GateRow {
        id: gate_row_id(&epic_id, Stage::Testing, "tests_pass"),
        stage_id: stage.id.clone(),
        gate_name: "tests_pass".to_owned(),
        outcome: GateOutcome::Fail,
        checked_at: at(10)?,
        checked_by: Some("ci".to_owned()),
        details: Some("3 failures".to_owned()),
    };
    mirror.upsert_gate(&gate).await?;
    gate.outcome = GateOutcome::Pass;
    gate.checked_at = at(11)?;
    gate.details = None;
    mirror.upsert_gate(&gate).await?;
    assert_eq!(mirror.find_gates(&stage.id).await?, vec![gate]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn manifest_sync_fits_the_longest_epic_id(
    #[future] prepared_mirror: Result<PreparedMirror, BoxError>,
) -> Result<(), BoxError> {
    let PreparedMirror {
        mirror,
        temp_db: _temp_db,
    } = prepared_mirror.await?;
    let mirror = Arc::new(mirror);
    let store = Arc::new(InMemoryManifestStore::new());
    let clock = DefaultClock;
    let epic_id = EpicId::new("E".repeat(EpicId::MAX_LENGTH))?;

    let mut manifest = EpicManifest::new(epic_id.clone(), &clock);
    manifest.start_stage(Stage::Research, &clock)?;
    manifest.complete_stage(Stage::Research, vec!["findings.md".to_owned()], &clock)?;
    manifest.record_gate(
        Stage::Research,
        "sources_cited",
        GateRecord {
            outcome: GateOutcome::Pass,
            checked_at: at(12)?,
            checked_by: Some("reviewer".to_owned()),
            details: None,
        },
    )?;
    store.save(&manifest).await?;

    let synchronizer = MirrorSynchronizer::new(store, Arc::clone(&mirror));
    synchronizer.try_sync_manifest(&epic_id).await?;
    synchronizer.try_sync_manifest(&epic_id).await?;

    let pipelines = mirror.list_pipelines().await?;
    assert_eq!(pipelines.len(), 1);
    let stages = mirror.find_stages(&pipeline_row_id(&epic_id)).await?;
    assert_eq!(stages.len(), 9);
    let research = mirror
        .find_stage(&stage_row_id(&epic_id, Stage::Research))
        .await?
        .ok_or("research row missing")?;
    assert_eq!(research.status, StageStatus::Completed);
    assert_eq!(research.artifacts, vec!["findings.md".to_owned()]);

    let gates = mirror.find_gates(&research.id).await?;
    assert_eq!(gates.len(), 1);
    assert!(gates.iter().all(|gate| gate.outcome == GateOutcome::Pass));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn gate_sync_creates_stub_parents_before_the_gate_row(
    #[future] prepared_mirror: Result<PreparedMirror, BoxError>,
) -> Result<(), BoxError> {
    let PreparedMirror {
        mirror,
        temp_db: _temp_db,
    } = prepared_mirror.await?;
    let mirror = Arc::new(mirror);
    let synchronizer =
        MirrorSynchronizer::new(Arc::new(InMemoryManifestStore::new()), Arc::clone(&mirror));
    let epic_id = EpicId::new("E8")?;
    let record = GateRecord {
        outcome: GateOutcome::Warn,
        checked_at: at(13)?,
        checked_by: None,
        details: Some("tag pending".to_owned()),
    };

    synchronizer
        .try_sync_gate(&epic_id, Stage::Release, "version_tagged", &record)
        .await?;

    let pipeline = mirror
        .find_pipeline(&pipeline_row_id(&epic_id))
        .await?
        .ok_or("stub pipeline row missing")?;
    assert_eq!(pipeline.current_stage, Stage::Research);
    let release = mirror
        .find_stage(&stage_row_id(&epic_id, Stage::Release))
        .await?
        .ok_or("stub stage row missing")?;
    assert_eq!(release.status, StageStatus::NotStarted);
    assert_eq!(mirror.find_gates(&release.id).await?.len(), 1);
    Ok(())
}
