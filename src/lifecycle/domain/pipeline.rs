//! Pipeline state machine.
//!
//! [`PipelineContext`] is the in-memory representation of one epic's
//! pipeline. Every mutation goes through the functions in this module and
//! yields a new context; nothing here performs I/O, so callers persist the
//! returned context themselves.

use super::{
    ALL_STAGES, EpicId, LifecycleDomainError, PipelineStatus, PrerequisiteCheck, Stage, StageStatus,
    StatusSnapshot, TransitionCheck, check_prerequisites, check_transition, join_stages,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-stage record within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage this record describes.
    pub stage: Stage,
    /// Current status.
    pub status: StageStatus,
    /// When work on the stage first started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the stage reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Agent responsible for the stage.
    pub assigned_agent: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Artifacts produced by the stage.
    pub artifacts: Vec<String>,
}

impl StageRecord {
    /// Creates a `not_started` record.
    #[must_use]
    pub const fn not_started(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::NotStarted,
            started_at: None,
            completed_at: None,
            assigned_agent: None,
            notes: None,
            artifacts: Vec::new(),
        }
    }
}

/// Authoritative in-memory state of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineContext {
    /// Pipeline identity (the epic it tracks).
    pub pipeline_id: EpicId,
    /// Current stage.
    pub current_stage: Stage,
    /// Aggregate status.
    pub status: PipelineStatus,
    /// One record per stage, keyed in canonical order.
    pub stages: BTreeMap<Stage, StageRecord>,
    /// Number of executed transitions; never decreases.
    pub transition_count: u32,
    /// Optimistic-concurrency revision.
    pub revision: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// When the pipeline reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

/// A requested stage move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Stage the caller believes is current.
    pub from: Stage,
    /// Target stage.
    pub to: Stage,
    /// Whether rule and prerequisite checks may be overridden.
    pub force: bool,
    /// Why the transition was requested.
    pub reason: Option<String>,
    /// Who requested the transition.
    pub initiated_by: Option<String>,
}

impl Transition {
    /// Creates an unforced transition.
    #[must_use]
    pub const fn new(from: Stage, to: Stage) -> Self {
        Self {
            from,
            to,
            force: false,
            reason: None,
            initiated_by: None,
        }
    }

    /// Sets the force flag.
    #[must_use]
    pub const fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Sets the transition reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the initiating agent.
    #[must_use]
    pub fn initiated_by(mut self, agent: impl Into<String>) -> Self {
        self.initiated_by = Some(agent.into());
        self
    }
}

/// Validation result for a proposed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionValidation {
    /// Whether the transition may execute.
    pub valid: bool,
    /// Hard errors.
    pub errors: Vec<String>,
    /// Soft findings, only populated when the transition is forced.
    pub warnings: Vec<String>,
    /// Rule-table decision.
    pub rule: TransitionCheck,
    /// Prerequisite walk for the target stage.
    pub prerequisites: PrerequisiteCheck,
}

/// Result of executing a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    /// Whether the transition was applied.
    pub success: bool,
    /// The resulting context; identical to the input on failure.
    pub context: PipelineContext,
    /// Validation errors when the transition was rejected.
    pub errors: Vec<String>,
    /// Warnings raised while validating.
    pub warnings: Vec<String>,
    /// Full validation details.
    pub validation: TransitionValidation,
}

impl PipelineContext {
    /// Creates a pipeline with its first stage in progress at revision 1.
    #[must_use]
    pub fn initialize(
        pipeline_id: EpicId,
        assigned_agent: Option<String>,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        let mut stages: BTreeMap<Stage, StageRecord> = ALL_STAGES
            .into_iter()
            .map(|stage| (stage, StageRecord::not_started(stage)))
            .collect();
        if let Some(first) = stages.get_mut(&Stage::FIRST) {
            first.status = StageStatus::InProgress;
            first.started_at = Some(timestamp);
            first.assigned_agent = assigned_agent;
        }

        Self {
            pipeline_id,
            current_stage: Stage::FIRST,
            status: PipelineStatus::Active,
            stages,
            transition_count: 0,
            revision: 1,
            created_at: timestamp,
            updated_at: timestamp,
            completed_at: None,
        }
    }

    /// Returns the record for `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleDomainError::MissingStageRecord`] when the context
    /// was built from an incomplete snapshot.
    pub fn record(&self, stage: Stage) -> Result<&StageRecord, LifecycleDomainError> {
        self.stages
            .get(&stage)
            .ok_or(LifecycleDomainError::MissingStageRecord(stage))
    }

    /// Returns the status of `stage`, if recorded.
    #[must_use]
    pub fn status_of(&self, stage: Stage) -> Option<StageStatus> {
        self.stages.get(&stage).map(|record| record.status)
    }

    /// Returns the per-stage status snapshot.
    #[must_use]
    pub fn status_snapshot(&self) -> StatusSnapshot {
        self.stages
            .iter()
            .map(|(stage, record)| (*stage, record.status))
            .collect()
    }

    /// Returns whether the pipeline accepts no further transitions.
    #[must_use]
    pub fn is_terminal_state(&self) -> bool {
        self.status.is_terminal()
            || self
                .stages
                .values()
                .all(|record| record.status.is_terminal())
    }

    /// Returns whether any stage is blocked.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.status == PipelineStatus::Blocked
            || self
                .stages
                .values()
                .any(|record| record.status == StageStatus::Blocked)
    }

    /// Validates `transition` against the rules, prerequisites, and target
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleDomainError::StageMismatch`] when `transition.from`
    /// is not the current stage.
    pub fn validate_transition(
        &self,
        transition: &Transition,
    ) -> Result<TransitionValidation, LifecycleDomainError> {
        if transition.from != self.current_stage {
            return Err(LifecycleDomainError::StageMismatch {
                requested: transition.from,
                current: self.current_stage,
            });
        }

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.status.is_terminal() {
            errors.push(format!(
                "Pipeline {} is {} and accepts no transitions",
                self.pipeline_id, self.status
            ));
        }

        let rule = check_transition(transition.from, transition.to, transition.force);
        let prerequisites =
            check_prerequisites(transition.to, &self.projected_snapshot(transition));
        if transition.from == transition.to {
            return Ok(TransitionValidation {
                valid: errors.is_empty(),
                errors,
                warnings,
                rule,
                prerequisites,
            });
        }

        if !rule.allowed {
            errors.push(rule.reason.clone());
        } else if rule.requires_force {
            warnings.push(format!("Forced: {}", rule.reason));
        }

        if !prerequisites.met {
            let missing = join_stages(&prerequisites.missing());
            if transition.force && prerequisites.can_force {
                warnings.push(format!("Unmet prerequisites bypassed: {missing}"));
            } else {
                errors.push(format!(
                    "Unmet prerequisites for {}: {missing}",
                    transition.to
                ));
            }
        }

        let source = self.record(transition.from)?;
        if matches!(source.status, StageStatus::Blocked | StageStatus::Failed) {
            if transition.force {
                warnings.push(format!(
                    "Completing {} stage {}",
                    source.status, transition.from
                ));
            } else {
                errors.push(format!(
                    "Stage {} is {} and cannot be completed; resume it or pass force",
                    transition.from, source.status
                ));
            }
        }

        let target = self.record(transition.to)?;
        if target.status.is_terminal() {
            if transition.force {
                warnings.push(format!(
                    "Reopening {} stage {}",
                    target.status, transition.to
                ));
            } else {
                errors.push(format!(
                    "Stage {} is already {}; reopening requires force",
                    transition.to, target.status
                ));
            }
        }

        if !transition.force {
            warnings.clear();
        }

        Ok(TransitionValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
            rule,
            prerequisites,
        })
    }

    /// Validates and applies `transition`, returning the new context.
    ///
    /// A rejected transition yields `success == false` and an unchanged
    /// context.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleDomainError::StageMismatch`] when `transition.from`
    /// is not the current stage.
    pub fn execute_transition(
        &self,
        transition: &Transition,
        clock: &impl Clock,
    ) -> Result<TransitionOutcome, LifecycleDomainError> {
        let validation = self.validate_transition(transition)?;
        if !validation.valid {
            return Ok(TransitionOutcome {
                success: false,
                context: self.clone(),
                errors: validation.errors.clone(),
                warnings: validation.warnings.clone(),
                validation,
            });
        }

        if transition.from == transition.to {
            return Ok(TransitionOutcome {
                success: true,
                context: self.clone(),
                errors: Vec::new(),
                warnings: validation.warnings.clone(),
                validation,
            });
        }

        let timestamp = clock.utc();
        let mut next = self.clone();
        for stage in next.auto_skipped(transition) {
            if let Some(record) = next.stages.get_mut(&stage) {
                record.status = StageStatus::Skipped;
                record.completed_at = Some(timestamp);
            }
        }
        if let Some(from) = next
            .stages
            .get_mut(&transition.from)
            .filter(|record| !record.status.is_terminal())
        {
            from.status = StageStatus::Completed;
            from.completed_at = Some(timestamp);
            from.started_at.get_or_insert(timestamp);
        }
        if let Some(to) = next.stages.get_mut(&transition.to) {
            to.status = StageStatus::InProgress;
            to.started_at.get_or_insert(timestamp);
            to.completed_at = None;
            if to.assigned_agent.is_none() {
                to.assigned_agent.clone_from(&transition.initiated_by);
            }
        }
        next.current_stage = transition.to;
        next.transition_count = next.transition_count.saturating_add(1);
        next.refresh_status(timestamp);
        next.revision = next.revision.saturating_add(1);
        next.updated_at = timestamp;

        Ok(TransitionOutcome {
            success: true,
            context: next,
            errors: Vec::new(),
            warnings: validation.warnings.clone(),
            validation,
        })
    }

    /// Directly sets the status of one stage, for non-linear changes such
    /// as blocking or failing a stage.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleDomainError::InvalidStatusTransition`] when the
    /// move is not in the adjacency table, or
    /// [`LifecycleDomainError::MissingStageRecord`] for an incomplete
    /// context.
    pub fn set_stage_status(
        &self,
        stage: Stage,
        status: StageStatus,
        clock: &impl Clock,
    ) -> Result<Self, LifecycleDomainError> {
        let current = self.record(stage)?.status;
        if !current.can_transition_to(status) {
            return Err(LifecycleDomainError::InvalidStatusTransition {
                stage,
                from: current,
                to: status,
            });
        }

        let timestamp = clock.utc();
        let mut next = self.clone();
        if let Some(record) = next.stages.get_mut(&stage) {
            record.status = status;
            match status {
                StageStatus::InProgress => {
                    record.started_at.get_or_insert(timestamp);
                    record.completed_at = None;
                }
                StageStatus::Completed | StageStatus::Skipped => {
                    record.completed_at = Some(timestamp);
                }
                StageStatus::NotStarted => {
                    record.started_at = None;
                    record.completed_at = None;
                }
                StageStatus::Blocked | StageStatus::Failed => {}
            }
        }

        next.current_stage = next.derive_current_stage();
        next.refresh_status(timestamp);
        next.revision = next.revision.saturating_add(1);
        next.updated_at = timestamp;
        Ok(next)
    }

    /// Returns stages reachable from the current stage by a valid
    /// transition, optionally including ones that need force.
    #[must_use]
    pub fn valid_next_stages(&self, include_forced: bool) -> Vec<Stage> {
        ALL_STAGES
            .into_iter()
            .filter(|stage| *stage != self.current_stage)
            .filter(|stage| {
                let unforced = Transition::new(self.current_stage, *stage);
                if self
                    .validate_transition(&unforced)
                    .is_ok_and(|validation| validation.valid)
                {
                    return true;
                }
                include_forced
                    && self
                        .validate_transition(&unforced.forced(true))
                        .is_ok_and(|validation| validation.valid)
            })
            .collect()
    }

    /// Skippable stages a forward transition jumps over that have not been
    /// started; executing the transition records them as skipped.
    fn auto_skipped(&self, transition: &Transition) -> Vec<Stage> {
        transition
            .from
            .stages_between(transition.to)
            .into_iter()
            .filter(|stage| stage.is_skippable())
            .filter(|stage| self.status_of(*stage) == Some(StageStatus::NotStarted))
            .collect()
    }

    /// Status snapshot as it would look once `transition` applies: the
    /// source stage completed and jumped-over skippable stages skipped.
    fn projected_snapshot(&self, transition: &Transition) -> StatusSnapshot {
        let mut snapshot = self.status_snapshot();
        if transition.from == transition.to {
            return snapshot;
        }
        for stage in self.auto_skipped(transition) {
            snapshot.insert(stage, StageStatus::Skipped);
        }
        if let Some(status) = snapshot.get_mut(&transition.from) {
            if !status.is_terminal() {
                *status = StageStatus::Completed;
            }
        }
        snapshot
    }

    /// Highest-order in-progress stage, else the last stage when every
    /// record is terminal, else the current stage unchanged.
    fn derive_current_stage(&self) -> Stage {
        if let Some(stage) = self
            .stages
            .values()
            .rev()
            .find(|record| record.status == StageStatus::InProgress)
            .map(|record| record.stage)
        {
            return stage;
        }
        if self.stages.values().all(|record| record.status.is_terminal()) {
            return Stage::LAST;
        }
        self.current_stage
    }

    fn refresh_status(&mut self, timestamp: DateTime<Utc>) {
        self.status = self.derive_status();
        if self.status.is_terminal() {
            self.completed_at.get_or_insert(timestamp);
        } else {
            self.completed_at = None;
        }
    }

    fn derive_status(&self) -> PipelineStatus {
        if self.status.is_terminal() && self.status != PipelineStatus::Failed {
            return self.status;
        }
        let statuses = || self.stages.values().map(|record| record.status);
        if statuses().any(|status| status == StageStatus::Failed) {
            PipelineStatus::Failed
        } else if statuses().any(|status| status == StageStatus::Blocked) {
            PipelineStatus::Blocked
        } else if statuses().all(StageStatus::is_terminal) {
            PipelineStatus::Completed
        } else {
            PipelineStatus::Active
        }
    }
}
