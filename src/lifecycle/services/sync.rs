//! One-directional projection of manifests into the relational mirror.
//!
//! The manifest is authoritative. Every public `sync_*` entry point logs and
//! swallows failures so a mirror outage never fails or rolls back a manifest
//! mutation; re-running a sync after a partial failure converges.

use crate::lifecycle::{
    domain::{
        EpicId, GateRecord, GateRow, ManifestProjection, PipelineRow, Stage, StageRow, gate_row_id,
        pipeline_row_id, stage_row_id,
    },
    ports::{LifecycleMirror, ManifestStore, ManifestStoreError, MirrorError},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while projecting into the mirror.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No manifest exists for the epic.
    #[error("no manifest stored for epic {0}")]
    ManifestNotFound(EpicId),
    /// The manifest store failed.
    #[error(transparent)]
    Store(#[from] ManifestStoreError),
    /// The mirror failed.
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Result type for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Outcome of a backfill over every stored manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Epics found in the store.
    pub total: usize,
    /// Epics projected successfully.
    pub synced: usize,
    /// Epics whose projection failed.
    pub failed: Vec<EpicId>,
}

/// Projects manifests and gate events into a [`LifecycleMirror`].
#[derive(Clone)]
pub struct MirrorSynchronizer<S, M>
where
    S: ManifestStore,
    M: LifecycleMirror,
{
    store: Arc<S>,
    mirror: Arc<M>,
}

impl<S, M> MirrorSynchronizer<S, M>
where
    S: ManifestStore,
    M: LifecycleMirror,
{
    /// Creates a synchronizer over `store` and `mirror`.
    #[must_use]
    pub const fn new(store: Arc<S>, mirror: Arc<M>) -> Self {
        Self { store, mirror }
    }

    /// Projects the stored manifest for `epic_id`, logging any failure.
    ///
    /// Returns whether the projection succeeded.
    pub async fn sync_manifest_to_db(&self, epic_id: &EpicId) -> bool {
        match self.try_sync_manifest(epic_id).await {
            Ok(()) => true,
            Err(err) => {
                warn!(epic_id = %epic_id, error = %err, "manifest sync to mirror failed");
                false
            }
        }
    }

    /// Projects the stored manifest for `epic_id`: one pipeline row, nine
    /// stage rows, and one row per recorded gate result.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the manifest is missing or either store
    /// fails. Rows written before the failure are left in place.
    pub async fn try_sync_manifest(&self, epic_id: &EpicId) -> SyncResult<()> {
        let manifest = self
            .store
            .load(epic_id)
            .await?
            .ok_or_else(|| SyncError::ManifestNotFound(epic_id.clone()))?;
        let existing = self.mirror.find_pipeline(&pipeline_row_id(epic_id)).await?;
        let projection = ManifestProjection::from_manifest(&manifest, existing.as_ref());

        self.mirror.upsert_pipeline(&projection.pipeline).await?;
        for stage in &projection.stages {
            self.mirror.upsert_stage(stage).await?;
        }
        for gate in &projection.gates {
            self.mirror.upsert_gate(gate).await?;
        }

        info!(
            epic_id = %epic_id,
            title = manifest.title().unwrap_or_default(),
            status = %projection.pipeline.status,
            current_stage = %projection.pipeline.current_stage,
            gates = projection.gates.len(),
            "synced manifest to mirror"
        );
        Ok(())
    }

    /// Mirrors a single gate result, logging any failure.
    ///
    /// Returns whether the write succeeded.
    pub async fn sync_gate_to_db(
        &self,
        epic_id: &EpicId,
        stage: Stage,
        gate: &str,
        record: &GateRecord,
    ) -> bool {
        match self.try_sync_gate(epic_id, stage, gate, record).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    epic_id = %epic_id,
                    stage = %stage,
                    gate,
                    error = %err,
                    "gate sync to mirror failed"
                );
                false
            }
        }
    }

    /// Upserts one gate row, first creating stub pipeline and stage rows
    /// when they are absent.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mirror`] when a mirror read or write fails.
    pub async fn try_sync_gate(
        &self,
        epic_id: &EpicId,
        stage: Stage,
        gate: &str,
        record: &GateRecord,
    ) -> SyncResult<()> {
        let pipeline_id = pipeline_row_id(epic_id);
        if self.mirror.find_pipeline(&pipeline_id).await?.is_none() {
            debug!(epic_id = %epic_id, "creating stub pipeline row for gate result");
            self.mirror
                .upsert_pipeline(&PipelineRow::stub(epic_id, record.checked_at))
                .await?;
        }

        let stage_id = stage_row_id(epic_id, stage);
        if self.mirror.find_stage(&stage_id).await?.is_none() {
            debug!(epic_id = %epic_id, stage = %stage, "creating stub stage row for gate result");
            self.mirror
                .upsert_stage(&StageRow::stub(epic_id, stage))
                .await?;
        }

        self.mirror
            .upsert_gate(&GateRow {
                id: gate_row_id(epic_id, stage, gate),
                stage_id,
                gate_name: gate.to_owned(),
                outcome: record.outcome,
                checked_at: record.checked_at,
                checked_by: record.checked_by.clone(),
                details: record.details.clone(),
            })
            .await?;

        info!(
            epic_id = %epic_id,
            stage = %stage,
            gate,
            outcome = %record.outcome,
            "synced gate result to mirror"
        );
        Ok(())
    }

    /// Projects every stored manifest independently. One failing epic does
    /// not stop the others.
    pub async fn backfill_all_epics(&self) -> BackfillReport {
        let epics = match self.store.list_epics().await {
            Ok(epics) => epics,
            Err(err) => {
                warn!(error = %err, "could not enumerate manifests for backfill");
                return BackfillReport::default();
            }
        };

        let mut report = BackfillReport {
            total: epics.len(),
            ..BackfillReport::default()
        };
        for epic_id in epics {
            if self.sync_manifest_to_db(&epic_id).await {
                report.synced += 1;
            } else {
                report.failed.push(epic_id);
            }
        }

        info!(
            total = report.total,
            synced = report.synced,
            failed = report.failed.len(),
            "backfill finished"
        );
        report
    }
}
