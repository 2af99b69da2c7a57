//! Stable numeric error codes shared by lifecycle services.

use crate::lifecycle::domain::LifecycleDomainError;
use std::fmt;

/// Numeric status code carried by every service error.
///
/// Values are stable and are surfaced verbatim by outer layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unclassified failure, including persistence errors.
    General,
    /// Malformed caller input.
    InvalidInput,
    /// The requested epic or pipeline does not exist.
    NotFound,
    /// The pipeline already exists.
    AlreadyExists,
    /// A concurrent writer changed the pipeline first.
    Conflict,
    /// A strict gate blocked the stage.
    GateFailed,
    /// The requested stage or status change is not allowed.
    InvalidTransition,
}

impl ErrorCode {
    /// Returns the numeric value of the code.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::General => 1,
            Self::InvalidInput => 2,
            Self::NotFound => 4,
            Self::AlreadyExists => 6,
            Self::Conflict => 7,
            Self::GateFailed => 80,
            Self::InvalidTransition => 83,
        }
    }

    /// Returns the symbolic name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::Conflict => "conflict",
            Self::GateFailed => "gate_failed",
            Self::InvalidTransition => "invalid_transition",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.value())
    }
}

pub(super) const fn domain_error_code(err: &LifecycleDomainError) -> ErrorCode {
    match err {
        LifecycleDomainError::InvalidEpicId(_)
        | LifecycleDomainError::UnknownGate { .. }
        | LifecycleDomainError::EmptySkipReason(_) => ErrorCode::InvalidInput,
        LifecycleDomainError::StageMismatch { .. }
        | LifecycleDomainError::InvalidStatusTransition { .. }
        | LifecycleDomainError::StageAlreadyTerminal { .. }
        | LifecycleDomainError::StageNotSkippable(_) => ErrorCode::InvalidTransition,
        LifecycleDomainError::MissingStageRecord(_) => ErrorCode::General,
    }
}

pub(super) fn domain_remedy(err: &LifecycleDomainError) -> String {
    match err {
        LifecycleDomainError::InvalidEpicId(_) => {
            "Use an epic id of 1-64 letters, digits, '-' or '_'".to_owned()
        }
        LifecycleDomainError::UnknownGate { stage, .. } => format!(
            "Record one of the gates defined for {stage}: {}",
            stage.definition().required_gates.join(", ")
        ),
        LifecycleDomainError::EmptySkipReason(stage) => {
            format!("Provide a reason when skipping {stage}")
        }
        LifecycleDomainError::StageMismatch { current, .. } => {
            format!("Transition from the current stage {current}")
        }
        LifecycleDomainError::InvalidStatusTransition { stage, from, .. } => {
            format!("Choose a status reachable from {from} for stage {stage}")
        }
        LifecycleDomainError::StageAlreadyTerminal { stage, status } => stage.next().map_or_else(
            || format!("Stage {stage} is {status} and no later stage remains"),
            |next| format!("Stage {stage} is {status}; start stage {next} instead"),
        ),
        LifecycleDomainError::StageNotSkippable(stage) => {
            format!("Complete stage {stage}; only decision stages may be skipped")
        }
        LifecycleDomainError::MissingStageRecord(stage) => {
            format!("Re-sync the pipeline so stage {stage} has a record")
        }
    }
}
