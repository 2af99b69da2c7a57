//! Canonical per-epic lifecycle document.
//!
//! The manifest is the authoritative record of an epic's progress. It is
//! rewritten in full on every mutation; the relational mirror is derived
//! from it.

use super::{
    ALL_STAGES, EpicId, GateOutcome, LifecycleDomainError, PipelineStatus, Stage, StageStatus,
    StatusSnapshot,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A gate result recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRecord {
    /// Gate outcome.
    pub outcome: GateOutcome,
    /// When the gate was checked.
    pub checked_at: DateTime<Utc>,
    /// Agent that checked the gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_by: Option<String>,
    /// Detail or failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Stage entry within a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManifestStage {
    /// Stage status.
    pub status: StageStatus,
    /// When the stage started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the stage completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// When the stage was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_at: Option<DateTime<Utc>>,
    /// Why the stage was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Agent responsible for the stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Artifacts produced by the stage.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Gate results keyed by gate name.
    #[serde(default)]
    pub gates: BTreeMap<String, GateRecord>,
}

/// Canonical lifecycle document for one epic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicManifest {
    epic_id: EpicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    stages: BTreeMap<Stage, ManifestStage>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Effect of starting a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStart {
    /// The stage moved to `in_progress`.
    Started,
    /// The stage was already in progress.
    AlreadyInProgress,
}

impl EpicManifest {
    /// Creates a manifest with every stage `not_started`.
    #[must_use]
    pub fn new(epic_id: EpicId, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            epic_id,
            title: None,
            stages: ALL_STAGES
                .into_iter()
                .map(|stage| (stage, ManifestStage::default()))
                .collect(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Fills in any stage entries missing from a persisted document.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for stage in ALL_STAGES {
            self.stages.entry(stage).or_default();
        }
        self
    }

    /// Sets the epic title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Returns the epic identifier.
    #[must_use]
    pub const fn epic_id(&self) -> &EpicId {
        &self.epic_id
    }

    /// Returns the epic title, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns every stage entry in canonical order.
    pub fn stages(&self) -> impl Iterator<Item = (Stage, &ManifestStage)> {
        self.stages.iter().map(|(stage, entry)| (*stage, entry))
    }

    /// Returns the entry for `stage`, if present.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&ManifestStage> {
        self.stages.get(&stage)
    }

    /// Returns the status of `stage`; absent entries read as `not_started`.
    #[must_use]
    pub fn status_of(&self, stage: Stage) -> StageStatus {
        self.stages
            .get(&stage)
            .map_or(StageStatus::NotStarted, |entry| entry.status)
    }

    /// Returns the per-stage status snapshot.
    #[must_use]
    pub fn status_snapshot(&self) -> StatusSnapshot {
        self.stages
            .iter()
            .map(|(stage, entry)| (*stage, entry.status))
            .collect()
    }

    /// First in-progress stage in canonical order, else the first
    /// not-started stage. `None` when every stage is finished.
    #[must_use]
    pub fn current_stage(&self) -> Option<Stage> {
        self.first_with(StageStatus::InProgress)
            .or_else(|| self.first_with(StageStatus::NotStarted))
    }

    /// Aggregate pipeline status derived from stage statuses.
    #[must_use]
    pub fn aggregate_status(&self) -> PipelineStatus {
        let statuses = || ALL_STAGES.into_iter().map(|stage| self.status_of(stage));
        if statuses().any(|status| status == StageStatus::Blocked) {
            PipelineStatus::Blocked
        } else if statuses().all(StageStatus::is_terminal) {
            PipelineStatus::Completed
        } else {
            PipelineStatus::Active
        }
    }

    /// Marks `stage` as in progress.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleDomainError::StageAlreadyTerminal`] when the stage
    /// is completed or skipped.
    pub fn start_stage(
        &mut self,
        stage: Stage,
        clock: &impl Clock,
    ) -> Result<StageStart, LifecycleDomainError> {
        let status = self.status_of(stage);
        if status == StageStatus::InProgress {
            return Ok(StageStart::AlreadyInProgress);
        }
        if status.is_terminal() {
            return Err(LifecycleDomainError::StageAlreadyTerminal { stage, status });
        }

        let timestamp = clock.utc();
        let entry = self.stages.entry(stage).or_default();
        entry.status = StageStatus::InProgress;
        entry.started_at.get_or_insert(timestamp);
        self.updated_at = timestamp;
        Ok(StageStart::Started)
    }

    /// Marks `stage` as completed, appending `artifacts`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleDomainError::StageAlreadyTerminal`] when the stage
    /// is already completed or skipped.
    pub fn complete_stage(
        &mut self,
        stage: Stage,
        artifacts: Vec<String>,
        clock: &impl Clock,
    ) -> Result<(), LifecycleDomainError> {
        let status = self.status_of(stage);
        if status.is_terminal() {
            return Err(LifecycleDomainError::StageAlreadyTerminal { stage, status });
        }

        let timestamp = clock.utc();
        let entry = self.stages.entry(stage).or_default();
        entry.status = StageStatus::Completed;
        entry.started_at.get_or_insert(timestamp);
        entry.completed_at = Some(timestamp);
        for artifact in artifacts {
            if !entry.artifacts.contains(&artifact) {
                entry.artifacts.push(artifact);
            }
        }
        self.updated_at = timestamp;
        Ok(())
    }

    /// Marks `stage` as skipped. Skipping an already-skipped stage refreshes
    /// the reason.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleDomainError::StageNotSkippable`] for required
    /// stages, [`LifecycleDomainError::EmptySkipReason`] for a blank reason,
    /// and [`LifecycleDomainError::StageAlreadyTerminal`] when the stage is
    /// completed.
    pub fn skip_stage(
        &mut self,
        stage: Stage,
        reason: &str,
        clock: &impl Clock,
    ) -> Result<(), LifecycleDomainError> {
        if !stage.is_skippable() {
            return Err(LifecycleDomainError::StageNotSkippable(stage));
        }
        let trimmed = reason.trim();
        if trimmed.is_empty() {
            return Err(LifecycleDomainError::EmptySkipReason(stage));
        }
        let status = self.status_of(stage);
        if status == StageStatus::Completed {
            return Err(LifecycleDomainError::StageAlreadyTerminal { stage, status });
        }

        let timestamp = clock.utc();
        let entry = self.stages.entry(stage).or_default();
        entry.status = StageStatus::Skipped;
        entry.skipped_at = Some(timestamp);
        entry.skip_reason = Some(trimmed.to_owned());
        self.updated_at = timestamp;
        Ok(())
    }

    /// Upserts a gate result for `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleDomainError::UnknownGate`] when `gate` is not one
    /// of the stage's required gates.
    pub fn record_gate(
        &mut self,
        stage: Stage,
        gate: &str,
        record: GateRecord,
    ) -> Result<(), LifecycleDomainError> {
        if !stage.has_gate(gate) {
            return Err(LifecycleDomainError::UnknownGate {
                stage,
                gate: gate.to_owned(),
            });
        }
        let checked_at = record.checked_at;
        self.stages
            .entry(stage)
            .or_default()
            .gates
            .insert(gate.to_owned(), record);
        self.updated_at = checked_at;
        Ok(())
    }

    fn first_with(&self, status: StageStatus) -> Option<Stage> {
        ALL_STAGES
            .into_iter()
            .find(|stage| self.status_of(*stage) == status)
    }
}
