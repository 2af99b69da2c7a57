//! Error types for lifecycle domain validation and parsing.

use super::{Stage, StageStatus};
use thiserror::Error;

/// Errors returned by lifecycle domain operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleDomainError {
    /// The epic identifier is malformed.
    #[error("invalid epic id '{0}', expected 1-64 characters from [A-Za-z0-9_-]")]
    InvalidEpicId(String),

    /// The gate name is not one of the stage's required gates.
    #[error("unknown gate '{gate}' for stage {stage}")]
    UnknownGate {
        /// Stage the gate was recorded against.
        stage: Stage,
        /// Rejected gate name.
        gate: String,
    },

    /// A transition named a source stage other than the pipeline's current
    /// stage.
    #[error("transition starts at {requested} but the pipeline is at {current}")]
    StageMismatch {
        /// Stage the caller believed was current.
        requested: Stage,
        /// Stage the pipeline is actually at.
        current: Stage,
    },

    /// A direct status change is outside the adjacency table.
    #[error("invalid status change for stage {stage}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Stage being changed.
        stage: Stage,
        /// Current status.
        from: StageStatus,
        /// Requested status.
        to: StageStatus,
    },

    /// The stage already reached a terminal status.
    #[error("stage {stage} is already {status}")]
    StageAlreadyTerminal {
        /// Stage that was targeted.
        stage: Stage,
        /// Its terminal status.
        status: StageStatus,
    },

    /// The stage may not be skipped.
    #[error("stage {0} cannot be skipped")]
    StageNotSkippable(Stage),

    /// A skip was requested without a reason.
    #[error("skipping stage {0} requires a reason")]
    EmptySkipReason(Stage),

    /// A pipeline snapshot is missing one of the nine stage records.
    #[error("pipeline is missing the record for stage {0}")]
    MissingStageRecord(Stage),
}

/// Error returned while parsing stage identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown stage: {0}")]
pub struct ParseStageError(pub String);

/// Error returned while parsing stage statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown stage status: {0}")]
pub struct ParseStageStatusError(pub String);

/// Error returned while parsing pipeline statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown pipeline status: {0}")]
pub struct ParsePipelineStatusError(pub String);

/// Error returned while parsing gate outcomes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown gate outcome: {0}")]
pub struct ParseGateOutcomeError(pub String);

/// Error returned while parsing enforcement modes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown enforcement mode '{0}', expected strict, advisory, or off")]
pub struct ParseEnforcementModeError(pub String);
