//! `PostgreSQL` implementation of the lifecycle mirror.

use super::{
    models::{GateResultRow, PipelineRecord, StageRecordRow},
    schema::{lifecycle_gate_results, lifecycle_pipelines, lifecycle_stages},
};
use crate::lifecycle::{
    domain::{
        EpicId, GateOutcome, GateRow, PipelineRow, PipelineStatus, Stage, StageRow, StageStatus,
    },
    ports::{LifecycleMirror, MirrorError, MirrorResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use std::fmt;

/// `PostgreSQL` connection pool type used by the lifecycle mirror.
pub type LifecyclePgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed lifecycle mirror.
#[derive(Debug, Clone)]
pub struct PostgresLifecycleMirror {
    pool: LifecyclePgPool,
}

impl PostgresLifecycleMirror {
    /// Creates a new mirror from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: LifecyclePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> MirrorResult<T>
    where
        F: FnOnce(&mut PgConnection) -> MirrorResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(MirrorError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(MirrorError::persistence)?
    }
}

#[async_trait]
impl LifecycleMirror for PostgresLifecycleMirror {
    async fn find_pipeline(&self, id: &str) -> MirrorResult<Option<PipelineRow>> {
        let lookup_id = id.to_owned();
        self.run_blocking(move |connection| {
            let record = lifecycle_pipelines::table
                .filter(lifecycle_pipelines::id.eq(&lookup_id))
                .select(PipelineRecord::as_select())
                .first::<PipelineRecord>(connection)
                .optional()
                .map_err(MirrorError::persistence)?;
            record.map(pipeline_from_record).transpose()
        })
        .await
    }

    async fn list_pipelines(&self) -> MirrorResult<Vec<PipelineRow>> {
        self.run_blocking(|connection| {
            lifecycle_pipelines::table
                .order(lifecycle_pipelines::id.asc())
                .select(PipelineRecord::as_select())
                .load::<PipelineRecord>(connection)
                .map_err(MirrorError::persistence)?
                .into_iter()
                .map(pipeline_from_record)
                .collect()
        })
        .await
    }

    async fn upsert_pipeline(&self, row: &PipelineRow) -> MirrorResult<()> {
        let record = pipeline_to_record(row)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(lifecycle_pipelines::table)
                .values(&record)
                .on_conflict(lifecycle_pipelines::id)
                .do_update()
                .set(&record)
                .execute(connection)
                .map_err(MirrorError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn find_stage(&self, id: &str) -> MirrorResult<Option<StageRow>> {
        let lookup_id = id.to_owned();
        self.run_blocking(move |connection| {
            let record = lifecycle_stages::table
                .filter(lifecycle_stages::id.eq(&lookup_id))
                .select(StageRecordRow::as_select())
                .first::<StageRecordRow>(connection)
                .optional()
                .map_err(MirrorError::persistence)?;
            record.map(stage_from_record).transpose()
        })
        .await
    }

    async fn find_stages(&self, pipeline_id: &str) -> MirrorResult<Vec<StageRow>> {
        let lookup_id = pipeline_id.to_owned();
        self.run_blocking(move |connection| {
            lifecycle_stages::table
                .filter(lifecycle_stages::pipeline_id.eq(&lookup_id))
                .order(lifecycle_stages::sequence.asc())
                .select(StageRecordRow::as_select())
                .load::<StageRecordRow>(connection)
                .map_err(MirrorError::persistence)?
                .into_iter()
                .map(stage_from_record)
                .collect()
        })
        .await
    }

    async fn upsert_stage(&self, row: &StageRow) -> MirrorResult<()> {
        let record = stage_to_record(row)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(lifecycle_stages::table)
                .values(&record)
                .on_conflict(lifecycle_stages::id)
                .do_update()
                .set(&record)
                .execute(connection)
                .map_err(MirrorError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn find_gates(&self, stage_id: &str) -> MirrorResult<Vec<GateRow>> {
        let lookup_id = stage_id.to_owned();
        self.run_blocking(move |connection| {
            lifecycle_gate_results::table
                .filter(lifecycle_gate_results::stage_id.eq(&lookup_id))
                .order(lifecycle_gate_results::gate_name.asc())
                .select(GateResultRow::as_select())
                .load::<GateResultRow>(connection)
                .map_err(MirrorError::persistence)?
                .into_iter()
                .map(gate_from_record)
                .collect()
        })
        .await
    }

    async fn upsert_gate(&self, row: &GateRow) -> MirrorResult<()> {
        let record = gate_to_record(row);
        self.run_blocking(move |connection| {
            diesel::insert_into(lifecycle_gate_results::table)
                .values(&record)
                .on_conflict(lifecycle_gate_results::id)
                .do_update()
                .set(&record)
                .execute(connection)
                .map_err(MirrorError::persistence)?;
            Ok(())
        })
        .await
    }
}

fn invalid_row(id: &str, err: &dyn fmt::Display) -> MirrorError {
    MirrorError::InvalidRow {
        id: id.to_owned(),
        message: err.to_string(),
    }
}

pub(super) fn pipeline_to_record(row: &PipelineRow) -> MirrorResult<PipelineRecord> {
    Ok(PipelineRecord {
        id: row.id.clone(),
        epic_id: row.epic_id.as_str().to_owned(),
        current_stage: row.current_stage.as_str().to_owned(),
        status: row.status.as_str().to_owned(),
        transition_count: i32::try_from(row.transition_count)
            .map_err(|err| invalid_row(&row.id, &err))?,
        revision: i64::try_from(row.revision).map_err(|err| invalid_row(&row.id, &err))?,
        created_at: row.created_at,
        updated_at: row.updated_at,
        completed_at: row.completed_at,
    })
}

pub(super) fn pipeline_from_record(record: PipelineRecord) -> MirrorResult<PipelineRow> {
    let PipelineRecord {
        id,
        epic_id,
        current_stage,
        status,
        transition_count,
        revision,
        created_at,
        updated_at,
        completed_at,
    } = record;

    Ok(PipelineRow {
        epic_id: EpicId::new(epic_id).map_err(|err| invalid_row(&id, &err))?,
        current_stage: Stage::try_from(current_stage.as_str())
            .map_err(|err| invalid_row(&id, &err))?,
        status: PipelineStatus::try_from(status.as_str()).map_err(|err| invalid_row(&id, &err))?,
        transition_count: u32::try_from(transition_count)
            .map_err(|err| invalid_row(&id, &err))?,
        revision: u64::try_from(revision).map_err(|err| invalid_row(&id, &err))?,
        created_at,
        updated_at,
        completed_at,
        id,
    })
}

pub(super) fn stage_to_record(row: &StageRow) -> MirrorResult<StageRecordRow> {
    let artifacts = serde_json::to_value(&row.artifacts).map_err(MirrorError::persistence)?;
    Ok(StageRecordRow {
        id: row.id.clone(),
        pipeline_id: row.pipeline_id.clone(),
        stage_name: row.stage.as_str().to_owned(),
        sequence: i16::from(row.sequence),
        status: row.status.as_str().to_owned(),
        started_at: row.started_at,
        completed_at: row.completed_at,
        skipped_at: row.skipped_at,
        skip_reason: row.skip_reason.clone(),
        assigned_agent: row.assigned_agent.clone(),
        notes: row.notes.clone(),
        artifacts,
    })
}

pub(super) fn stage_from_record(record: StageRecordRow) -> MirrorResult<StageRow> {
    let stage =
        Stage::try_from(record.stage_name.as_str()).map_err(|err| invalid_row(&record.id, &err))?;
    let status =
        StageStatus::try_from(record.status.as_str()).map_err(|err| invalid_row(&record.id, &err))?;
    let artifacts = serde_json::from_value::<Vec<String>>(record.artifacts)
        .map_err(|err| invalid_row(&record.id, &err))?;

    Ok(StageRow {
        id: record.id,
        pipeline_id: record.pipeline_id,
        stage,
        sequence: stage.order(),
        status,
        started_at: record.started_at,
        completed_at: record.completed_at,
        skipped_at: record.skipped_at,
        skip_reason: record.skip_reason,
        assigned_agent: record.assigned_agent,
        notes: record.notes,
        artifacts,
    })
}

pub(super) fn gate_to_record(row: &GateRow) -> GateResultRow {
    GateResultRow {
        id: row.id.clone(),
        stage_id: row.stage_id.clone(),
        gate_name: row.gate_name.clone(),
        result: row.outcome.as_str().to_owned(),
        checked_at: row.checked_at,
        checked_by: row.checked_by.clone(),
        details: row.details.clone(),
    }
}

pub(super) fn gate_from_record(record: GateResultRow) -> MirrorResult<GateRow> {
    let outcome =
        GateOutcome::try_from(record.result.as_str()).map_err(|err| invalid_row(&record.id, &err))?;
    Ok(GateRow {
        id: record.id,
        stage_id: record.stage_id,
        gate_name: record.gate_name,
        outcome,
        checked_at: record.checked_at,
        checked_by: record.checked_by,
        details: record.details,
    })
}
