//! Manifest-backed stage operations with gate enforcement.

use super::{
    ErrorCode,
    MirrorSynchronizer,
    error::{domain_error_code, domain_remedy},
};
use crate::lifecycle::{
    domain::{
        EnforcementMode, EpicId, EpicManifest, GateCheck, GateOutcome, GateRecord,
        LifecycleDomainError, Stage, StageStart,
    },
    ports::{LifecycleMirror, ManifestStore, ManifestStoreError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Service-level errors for manifest operations.
#[derive(Debug, Error)]
pub enum LifecycleServiceError {
    /// A strict gate blocked the stage.
    #[error(
        "gate check failed for {}: {}",
        .0.target_stage,
        .0.message.as_deref().unwrap_or("prerequisites unmet")
    )]
    GateFailed(Box<GateCheck>),
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] LifecycleDomainError),
    /// The manifest store failed.
    #[error(transparent)]
    Store(#[from] ManifestStoreError),
}

impl LifecycleServiceError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::GateFailed(_) => ErrorCode::GateFailed,
            Self::Domain(err) => domain_error_code(err),
            Self::Store(_) => ErrorCode::General,
        }
    }

    /// Suggested remedy for the caller.
    #[must_use]
    pub fn remedy(&self) -> String {
        match self {
            Self::GateFailed(check) => check.remedy(),
            Self::Domain(err) => domain_remedy(err),
            Self::Store(_) => {
                "Check that the manifest directory is readable and writable".to_owned()
            }
        }
    }

    /// Stages whose absence caused the failure, if any.
    #[must_use]
    pub fn missing_stages(&self) -> &[Stage] {
        match self {
            Self::GateFailed(check) => &check.missing_prerequisites,
            Self::Domain(_) | Self::Store(_) => &[],
        }
    }
}

/// Result type for manifest operations.
pub type LifecycleServiceResult<T> = Result<T, LifecycleServiceError>;

/// Response of a successful stage start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStartReport {
    /// Manifest after the start.
    pub manifest: EpicManifest,
    /// Whether the stage moved or was already running.
    pub effect: StageStart,
    /// Gate evaluation that admitted the stage.
    pub gate: GateCheck,
}

impl StageStartReport {
    /// Informational note for stages admitted despite unmet prerequisites
    /// in advisory mode.
    #[must_use]
    pub fn advisory_note(&self) -> Option<&str> {
        if self.gate.mode == EnforcementMode::Advisory {
            self.gate.message.as_deref()
        } else {
            None
        }
    }
}

/// A gate result to record against a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResultRequest {
    stage: Stage,
    gate: String,
    outcome: GateOutcome,
    checked_by: Option<String>,
    details: Option<String>,
}

impl GateResultRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(stage: Stage, gate: impl Into<String>, outcome: GateOutcome) -> Self {
        Self {
            stage,
            gate: gate.into(),
            outcome,
            checked_by: None,
            details: None,
        }
    }

    /// Sets the agent that checked the gate.
    #[must_use]
    pub fn checked_by(mut self, agent: impl Into<String>) -> Self {
        self.checked_by = Some(agent.into());
        self
    }

    /// Sets detail or failure notes.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Stage operations over canonical manifests.
///
/// Every mutation loads (or lazily creates) the epic's manifest, applies
/// the change, saves the full document, and then mirrors it best-effort.
/// Callers serialize operations on the same epic.
#[derive(Clone)]
pub struct LifecycleService<S, M, C>
where
    S: ManifestStore,
    M: LifecycleMirror,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    synchronizer: MirrorSynchronizer<S, M>,
    clock: Arc<C>,
}

impl<S, M, C> LifecycleService<S, M, C>
where
    S: ManifestStore,
    M: LifecycleMirror,
    C: Clock + Send + Sync,
{
    /// Creates a service over the given store, mirror, and clock.
    #[must_use]
    pub fn new(store: Arc<S>, mirror: Arc<M>, clock: Arc<C>) -> Self {
        let synchronizer = MirrorSynchronizer::new(Arc::clone(&store), mirror);
        Self {
            store,
            synchronizer,
            clock,
        }
    }

    /// Returns the synchronizer used after each mutation.
    #[must_use]
    pub const fn synchronizer(&self) -> &MirrorSynchronizer<S, M> {
        &self.synchronizer
    }

    /// Returns the epic's manifest, or a fresh unsaved one when none exists.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleServiceError::Store`] when loading fails.
    pub async fn get_lifecycle_state(
        &self,
        epic_id: &EpicId,
    ) -> LifecycleServiceResult<EpicManifest> {
        self.load_or_new(epic_id).await
    }

    /// Evaluates whether `stage` may start under `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleServiceError::Store`] when loading fails.
    pub async fn check_gate(
        &self,
        epic_id: &EpicId,
        stage: Stage,
        mode: EnforcementMode,
    ) -> LifecycleServiceResult<GateCheck> {
        let manifest = self.load_or_new(epic_id).await?;
        Ok(GateCheck::evaluate(
            epic_id.clone(),
            stage,
            &manifest.status_snapshot(),
            mode,
        ))
    }

    /// Gate-checks and starts `stage`. Starting a running stage is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleServiceError::GateFailed`] when a strict gate
    /// blocks, [`LifecycleServiceError::Domain`] when the stage is already
    /// finished, and [`LifecycleServiceError::Store`] on persistence
    /// failure.
    pub async fn start_stage(
        &self,
        epic_id: &EpicId,
        stage: Stage,
        mode: EnforcementMode,
    ) -> LifecycleServiceResult<StageStartReport> {
        let mut manifest = self.load_or_new(epic_id).await?;
        let gate = GateCheck::evaluate(epic_id.clone(), stage, &manifest.status_snapshot(), mode);
        if !gate.allowed {
            warn!(
                epic_id = %epic_id,
                stage = %stage,
                missing = ?gate.missing_prerequisites,
                "gate blocked stage start"
            );
            return Err(LifecycleServiceError::GateFailed(Box::new(gate)));
        }
        if !gate.missing_prerequisites.is_empty() {
            warn!(
                epic_id = %epic_id,
                stage = %stage,
                missing = ?gate.missing_prerequisites,
                "advisory gate admitted stage with unmet prerequisites"
            );
        }

        let effect = manifest.start_stage(stage, &*self.clock)?;
        if effect == StageStart::AlreadyInProgress {
            debug!(epic_id = %epic_id, stage = %stage, "stage already in progress");
            return Ok(StageStartReport {
                manifest,
                effect,
                gate,
            });
        }

        self.persist(&manifest).await?;
        info!(epic_id = %epic_id, stage = %stage, mode = %mode, "stage started");
        Ok(StageStartReport {
            manifest,
            effect,
            gate,
        })
    }

    /// Completes `stage`, appending `artifacts`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleServiceError::Domain`] when the stage is already
    /// completed or skipped, and [`LifecycleServiceError::Store`] on
    /// persistence failure.
    pub async fn complete_stage(
        &self,
        epic_id: &EpicId,
        stage: Stage,
        artifacts: Vec<String>,
    ) -> LifecycleServiceResult<EpicManifest> {
        let mut manifest = self.load_or_new(epic_id).await?;
        manifest.complete_stage(stage, artifacts, &*self.clock)?;
        self.persist(&manifest).await?;
        info!(epic_id = %epic_id, stage = %stage, "stage completed");
        Ok(manifest)
    }

    /// Skips `stage` with `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleServiceError::Domain`] when the stage is not
    /// skippable, already completed, or the reason is blank, and
    /// [`LifecycleServiceError::Store`] on persistence failure.
    pub async fn skip_stage(
        &self,
        epic_id: &EpicId,
        stage: Stage,
        reason: &str,
    ) -> LifecycleServiceResult<EpicManifest> {
        let mut manifest = self.load_or_new(epic_id).await?;
        manifest.skip_stage(stage, reason, &*self.clock)?;
        self.persist(&manifest).await?;
        info!(epic_id = %epic_id, stage = %stage, reason, "stage skipped");
        Ok(manifest)
    }

    /// Records a gate result in the manifest and mirrors it directly.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleServiceError::Domain`] for a gate the stage does
    /// not define and [`LifecycleServiceError::Store`] on persistence
    /// failure.
    pub async fn record_gate_result(
        &self,
        epic_id: &EpicId,
        request: GateResultRequest,
    ) -> LifecycleServiceResult<EpicManifest> {
        let GateResultRequest {
            stage,
            gate,
            outcome,
            checked_by,
            details,
        } = request;
        let record = GateRecord {
            outcome,
            checked_at: self.clock.utc(),
            checked_by,
            details,
        };

        let mut manifest = self.load_or_new(epic_id).await?;
        manifest.record_gate(stage, &gate, record.clone())?;
        self.store.save(&manifest).await?;
        self.synchronizer
            .sync_gate_to_db(epic_id, stage, &gate, &record)
            .await;
        info!(
            epic_id = %epic_id,
            stage = %stage,
            gate = %gate,
            outcome = %outcome,
            "gate result recorded"
        );
        Ok(manifest)
    }

    async fn load_or_new(&self, epic_id: &EpicId) -> LifecycleServiceResult<EpicManifest> {
        let stored = self.store.load(epic_id).await?;
        Ok(stored.unwrap_or_else(|| EpicManifest::new(epic_id.clone(), &*self.clock)))
    }

    async fn persist(&self, manifest: &EpicManifest) -> LifecycleServiceResult<()> {
        self.store.save(manifest).await?;
        self.synchronizer
            .sync_manifest_to_db(manifest.epic_id())
            .await;
        Ok(())
    }
}
