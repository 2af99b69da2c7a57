//! Closed status types for stages, pipelines, and gates.
//!
//! Every presentation mapping is an exhaustive `match`; adding a variant
//! fails to compile until each mapping handles it.

use super::{ParseGateOutcomeError, ParsePipelineStatusError, ParseStageStatusError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one stage within a pipeline.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Work on the stage has not begun.
    #[default]
    NotStarted,
    /// The stage is being worked on.
    InProgress,
    /// The stage finished successfully.
    Completed,
    /// The stage was intentionally bypassed.
    Skipped,
    /// The stage is waiting on something external.
    Blocked,
    /// The stage failed.
    Failed,
}

/// All stage statuses.
pub const ALL_STAGE_STATUSES: [StageStatus; 6] = [
    StageStatus::NotStarted,
    StageStatus::InProgress,
    StageStatus::Completed,
    StageStatus::Skipped,
    StageStatus::Blocked,
    StageStatus::Failed,
];

impl StageStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        }
    }

    /// Returns whether a move to `target` is in the adjacency table.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::NotStarted, Self::InProgress | Self::Skipped)
                | (
                    Self::InProgress,
                    Self::Completed | Self::Blocked | Self::Failed | Self::NotStarted
                )
                | (Self::Blocked, Self::InProgress | Self::Failed)
                | (Self::Failed, Self::InProgress | Self::NotStarted)
        )
    }

    /// Returns whether the status has no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// Returns whether the status satisfies a downstream prerequisite.
    #[must_use]
    pub const fn satisfies_prerequisite(self) -> bool {
        self.is_terminal()
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StageStatus {
    type Error = ParseStageStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            "blocked" => Ok(Self::Blocked),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseStageStatusError(value.to_owned())),
        }
    }
}

/// Aggregate status of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// The pipeline is progressing.
    Active,
    /// Every stage is completed or skipped.
    Completed,
    /// At least one stage is blocked.
    Blocked,
    /// The pipeline was abandoned.
    Cancelled,
    /// The pipeline failed.
    Failed,
}

impl PipelineStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Returns whether the pipeline accepts no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PipelineStatus {
    type Error = ParsePipelineStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            _ => Err(ParsePipelineStatusError(value.to_owned())),
        }
    }
}

/// Outcome recorded for a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    /// The gate passed.
    Pass,
    /// The gate failed.
    Fail,
    /// The gate passed with reservations.
    Warn,
}

impl GateOutcome {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warn => "warn",
        }
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for GateOutcome {
    type Error = ParseGateOutcomeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pass" | "passed" => Ok(Self::Pass),
            "fail" | "failed" => Ok(Self::Fail),
            "warn" | "warning" => Ok(Self::Warn),
            _ => Err(ParseGateOutcomeError(value.to_owned())),
        }
    }
}
