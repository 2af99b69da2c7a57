//! Pipeline operations against the relational mirror.
//!
//! These operations drive the state machine directly on mirrored pipelines
//! and write the resulting context back with a revision check.

use super::{
    ErrorCode,
    error::{domain_error_code, domain_remedy},
};
use crate::lifecycle::{
    domain::{
        EpicId, LifecycleDomainError, PipelineContext, PipelineRow, PipelineStatus, Stage,
        StageStatus, Transition, TransitionOutcome, join_stages, pipeline_row_id,
    },
    ports::{LifecycleMirror, MirrorError},
};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Service-level errors for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineServiceError {
    /// No pipeline exists for the epic.
    #[error("no pipeline exists for epic {0}")]
    NotFound(EpicId),
    /// A pipeline already exists for the epic.
    #[error("a pipeline already exists for epic {0}")]
    AlreadyExists(EpicId),
    /// The state machine rejected the transition.
    #[error("invalid transition {from} -> {to} for epic {epic_id}: {}", .errors.join("; "))]
    InvalidTransition {
        /// Epic whose pipeline was targeted.
        epic_id: EpicId,
        /// Source stage.
        from: Stage,
        /// Requested stage.
        to: Stage,
        /// Validation errors.
        errors: Vec<String>,
        /// Stages that must finish first.
        missing: Vec<Stage>,
    },
    /// Another writer changed the pipeline since it was read.
    #[error("pipeline for epic {epic_id} changed: expected revision {expected}, found {actual}")]
    Conflict {
        /// Epic whose pipeline was targeted.
        epic_id: EpicId,
        /// Revision the caller worked from.
        expected: u64,
        /// Revision currently stored.
        actual: u64,
    },
    /// The pipeline already reached a terminal status.
    #[error("pipeline for epic {epic_id} is already {status}")]
    PipelineTerminal {
        /// Epic whose pipeline was targeted.
        epic_id: EpicId,
        /// Terminal status.
        status: PipelineStatus,
    },
    /// Stages before the last one are still open.
    #[error("pipeline for epic {epic_id} has unfinished stages: {}", join_stages(.pending))]
    IncompleteStages {
        /// Epic whose pipeline was targeted.
        epic_id: EpicId,
        /// Stages neither completed nor skipped.
        pending: Vec<Stage>,
    },
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] LifecycleDomainError),
    /// The mirror failed.
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

impl PipelineServiceError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::InvalidTransition { .. }
            | Self::PipelineTerminal { .. }
            | Self::IncompleteStages { .. } => ErrorCode::InvalidTransition,
            Self::Domain(err) => domain_error_code(err),
            Self::Mirror(_) => ErrorCode::General,
        }
    }

    /// Suggested remedy for the caller.
    #[must_use]
    pub fn remedy(&self) -> String {
        match self {
            Self::NotFound(epic_id) => format!("Initialize a pipeline for epic {epic_id} first"),
            Self::AlreadyExists(epic_id) => {
                format!("Load the existing pipeline for epic {epic_id} instead")
            }
            Self::InvalidTransition { to, missing, .. } if !missing.is_empty() => format!(
                "Complete {} before moving to {to}, or pass force",
                join_stages(missing)
            ),
            Self::InvalidTransition { to, .. } => {
                format!("Move to {to} through the intermediate stages, or pass force")
            }
            Self::Conflict { .. } => "Reload the pipeline and retry".to_owned(),
            Self::PipelineTerminal { status, .. } => {
                format!("The pipeline is {status}; start a new epic instead")
            }
            Self::IncompleteStages { pending, .. } => {
                format!("Complete or skip {} first", join_stages(pending))
            }
            Self::Domain(err) => domain_remedy(err),
            Self::Mirror(_) => "Check the mirror database connection".to_owned(),
        }
    }

    /// Stages whose absence caused the failure, if any.
    #[must_use]
    pub fn missing_stages(&self) -> &[Stage] {
        match self {
            Self::InvalidTransition { missing, .. } => missing,
            Self::IncompleteStages { pending, .. } => pending,
            _ => &[],
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineServiceResult<T> = Result<T, PipelineServiceError>;

/// Request to move a pipeline to another stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceStageRequest {
    epic_id: EpicId,
    to: Stage,
    reason: Option<String>,
    initiated_by: Option<String>,
    force: bool,
    expected_revision: Option<u64>,
}

impl AdvanceStageRequest {
    /// Creates an unforced request.
    #[must_use]
    pub const fn new(epic_id: EpicId, to: Stage) -> Self {
        Self {
            epic_id,
            to,
            reason: None,
            initiated_by: None,
            force: false,
            expected_revision: None,
        }
    }

    /// Sets the force override.
    #[must_use]
    pub const fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Sets the reason recorded with the transition.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the agent initiating the transition.
    #[must_use]
    pub fn initiated_by(mut self, agent: impl Into<String>) -> Self {
        self.initiated_by = Some(agent.into());
        self
    }

    /// Requires the stored pipeline to be at `revision`.
    #[must_use]
    pub const fn expecting_revision(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }
}

/// Filter for [`PipelineService::list_pipelines`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineFilter {
    /// Only pipelines with this status.
    pub status: Option<PipelineStatus>,
    /// Only pipelines at this stage.
    pub stage: Option<Stage>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

/// Aggregate counts over every mirrored pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatistics {
    /// Number of pipelines.
    pub total: usize,
    /// Pipelines per status.
    pub by_status: BTreeMap<PipelineStatus, usize>,
    /// Pipelines per current stage.
    pub by_stage: BTreeMap<Stage, usize>,
    /// Pipelines with status `completed`.
    pub completed: usize,
    /// Sum of transition counts.
    pub total_transitions: u64,
    /// Mean transitions per pipeline, rounded down; `None` when empty.
    pub average_transitions: Option<u64>,
}

/// Pipeline operations over the relational mirror.
#[derive(Clone)]
pub struct PipelineService<M, C>
where
    M: LifecycleMirror,
    C: Clock + Send + Sync,
{
    mirror: Arc<M>,
    clock: Arc<C>,
}

impl<M, C> PipelineService<M, C>
where
    M: LifecycleMirror,
    C: Clock + Send + Sync,
{
    /// Creates a service over `mirror`.
    #[must_use]
    pub const fn new(mirror: Arc<M>, clock: Arc<C>) -> Self {
        Self { mirror, clock }
    }

    /// Creates a pipeline with its first stage in progress.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::AlreadyExists`] when the epic has a
    /// pipeline and [`PipelineServiceError::Mirror`] on persistence failure.
    pub async fn initialize_pipeline(
        &self,
        epic_id: &EpicId,
        assigned_agent: Option<String>,
    ) -> PipelineServiceResult<PipelineContext> {
        if self
            .mirror
            .find_pipeline(&pipeline_row_id(epic_id))
            .await?
            .is_some()
        {
            return Err(PipelineServiceError::AlreadyExists(epic_id.clone()));
        }

        let context = PipelineContext::initialize(epic_id.clone(), assigned_agent, &*self.clock);
        self.write(&context).await?;
        info!(epic_id = %epic_id, "pipeline initialized");
        Ok(context)
    }

    /// Loads the pipeline for `epic_id`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::Mirror`] when the lookup fails.
    pub async fn get_pipeline(
        &self,
        epic_id: &EpicId,
    ) -> PipelineServiceResult<Option<PipelineContext>> {
        let Some(row) = self.mirror.find_pipeline(&pipeline_row_id(epic_id)).await? else {
            return Ok(None);
        };
        let stages = self.mirror.find_stages(&row.id).await?;
        Ok(Some(PipelineContext::from_rows(&row, &stages)))
    }

    /// Returns the current stage of the epic's pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::NotFound`] when no pipeline exists.
    pub async fn get_current_stage(&self, epic_id: &EpicId) -> PipelineServiceResult<Stage> {
        Ok(self.load(epic_id).await?.current_stage)
    }

    /// Moves the pipeline from its current stage to `request.to`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::InvalidTransition`] with the blocking
    /// stages when the move is rejected, [`PipelineServiceError::Conflict`]
    /// when the stored revision moved on, and
    /// [`PipelineServiceError::NotFound`] when no pipeline exists.
    pub async fn advance_stage(
        &self,
        request: AdvanceStageRequest,
    ) -> PipelineServiceResult<TransitionOutcome> {
        let context = self.load(&request.epic_id).await?;
        let expected = request.expected_revision.unwrap_or(context.revision);
        if expected != context.revision {
            return Err(PipelineServiceError::Conflict {
                epic_id: request.epic_id,
                expected,
                actual: context.revision,
            });
        }

        let mut transition =
            Transition::new(context.current_stage, request.to).forced(request.force);
        if let Some(reason) = request.reason {
            transition = transition.with_reason(reason);
        }
        if let Some(agent) = request.initiated_by {
            transition = transition.initiated_by(agent);
        }

        let outcome = context.execute_transition(&transition, &*self.clock)?;
        if !outcome.success {
            let mut missing = outcome.validation.prerequisites.missing();
            if !outcome.validation.rule.allowed {
                missing.extend(
                    transition
                        .from
                        .stages_between(transition.to)
                        .into_iter()
                        .filter(|stage| !stage.is_skippable())
                        .filter(|stage| {
                            context
                                .status_of(*stage)
                                .is_some_and(|status| !status.satisfies_prerequisite())
                        }),
                );
                missing.sort_unstable();
                missing.dedup();
            }
            return Err(PipelineServiceError::InvalidTransition {
                epic_id: request.epic_id,
                from: transition.from,
                to: transition.to,
                errors: outcome.errors,
                missing,
            });
        }

        if outcome.context == context {
            debug!(epic_id = %request.epic_id, stage = %transition.to, "transition is a no-op");
            return Ok(outcome);
        }

        self.write_checked(&outcome.context, expected).await?;
        info!(
            epic_id = %request.epic_id,
            from = %transition.from,
            to = %transition.to,
            forced = transition.force,
            revision = outcome.context.revision,
            "pipeline advanced"
        );
        Ok(outcome)
    }

    /// Lists mirrored pipelines matching `filter`, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::Mirror`] when the listing fails.
    pub async fn list_pipelines(
        &self,
        filter: &PipelineFilter,
    ) -> PipelineServiceResult<Vec<PipelineRow>> {
        let rows = self.mirror.list_pipelines().await?;
        Ok(rows
            .into_iter()
            .filter(|row| filter.status.is_none_or(|status| row.status == status))
            .filter(|row| filter.stage.is_none_or(|stage| row.current_stage == stage))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Completes the final stage and marks the pipeline completed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::IncompleteStages`] when any earlier
    /// stage is neither completed nor skipped and
    /// [`PipelineServiceError::PipelineTerminal`] for a finished pipeline.
    pub async fn complete_pipeline(
        &self,
        epic_id: &EpicId,
    ) -> PipelineServiceResult<PipelineContext> {
        let context = self.load(epic_id).await?;
        if context.status.is_terminal() {
            return Err(PipelineServiceError::PipelineTerminal {
                epic_id: epic_id.clone(),
                status: context.status,
            });
        }

        let pending: Vec<Stage> = context
            .stages
            .values()
            .filter(|record| record.stage != Stage::LAST && !record.status.is_terminal())
            .map(|record| record.stage)
            .collect();
        if !pending.is_empty() {
            return Err(PipelineServiceError::IncompleteStages {
                epic_id: epic_id.clone(),
                pending,
            });
        }

        let started = if context.record(Stage::LAST)?.status == StageStatus::InProgress {
            context.clone()
        } else {
            context.set_stage_status(Stage::LAST, StageStatus::InProgress, &*self.clock)?
        };
        let completed =
            started.set_stage_status(Stage::LAST, StageStatus::Completed, &*self.clock)?;

        self.write_checked(&completed, context.revision).await?;
        info!(epic_id = %epic_id, "pipeline completed");
        Ok(completed)
    }

    /// Marks the pipeline cancelled, noting `reason` on the current stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::PipelineTerminal`] for a finished
    /// pipeline and [`PipelineServiceError::NotFound`] when none exists.
    pub async fn cancel_pipeline(
        &self,
        epic_id: &EpicId,
        reason: &str,
    ) -> PipelineServiceResult<PipelineContext> {
        let context = self.load(epic_id).await?;
        if context.status.is_terminal() {
            return Err(PipelineServiceError::PipelineTerminal {
                epic_id: epic_id.clone(),
                status: context.status,
            });
        }

        let timestamp = self.clock.utc();
        let mut cancelled = context.clone();
        cancelled.status = PipelineStatus::Cancelled;
        cancelled.completed_at = Some(timestamp);
        cancelled.updated_at = timestamp;
        cancelled.revision = cancelled.revision.saturating_add(1);
        if let Some(record) = cancelled.stages.get_mut(&cancelled.current_stage) {
            record.notes = Some(format!("Cancelled: {}", reason.trim()));
        }

        self.write_checked(&cancelled, context.revision).await?;
        info!(epic_id = %epic_id, reason, "pipeline cancelled");
        Ok(cancelled)
    }

    /// Aggregates counts over every mirrored pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::Mirror`] when the listing fails.
    pub async fn get_pipeline_statistics(&self) -> PipelineServiceResult<PipelineStatistics> {
        let rows = self.mirror.list_pipelines().await?;
        let mut stats = PipelineStatistics {
            total: rows.len(),
            ..PipelineStatistics::default()
        };
        for row in &rows {
            *stats.by_status.entry(row.status).or_default() += 1;
            *stats.by_stage.entry(row.current_stage).or_default() += 1;
            stats.total_transitions += u64::from(row.transition_count);
        }
        stats.completed = stats
            .by_status
            .get(&PipelineStatus::Completed)
            .copied()
            .unwrap_or_default();
        stats.average_transitions = u64::try_from(rows.len())
            .ok()
            .and_then(|count| stats.total_transitions.checked_div(count));
        Ok(stats)
    }

    async fn load(&self, epic_id: &EpicId) -> PipelineServiceResult<PipelineContext> {
        self.get_pipeline(epic_id)
            .await?
            .ok_or_else(|| PipelineServiceError::NotFound(epic_id.clone()))
    }

    async fn write_checked(
        &self,
        context: &PipelineContext,
        expected_revision: u64,
    ) -> PipelineServiceResult<()> {
        let stored = self
            .mirror
            .find_pipeline(&pipeline_row_id(&context.pipeline_id))
            .await?
            .ok_or_else(|| PipelineServiceError::NotFound(context.pipeline_id.clone()))?;
        if stored.revision != expected_revision {
            return Err(PipelineServiceError::Conflict {
                epic_id: context.pipeline_id.clone(),
                expected: expected_revision,
                actual: stored.revision,
            });
        }
        self.write(context).await
    }

    async fn write(&self, context: &PipelineContext) -> PipelineServiceResult<()> {
        self.mirror.upsert_pipeline(&context.to_pipeline_row()).await?;
        for row in context.to_stage_rows() {
            self.mirror.upsert_stage(&row).await?;
        }
        Ok(())
    }
}
