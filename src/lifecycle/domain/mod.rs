//! Domain model for the epic lifecycle pipeline.
//!
//! The domain covers the stage catalog, transition validation, the pipeline
//! state machine, the canonical per-epic manifest, gate admission, and the
//! relational projection. None of it performs I/O.

mod error;
mod gate;
mod ids;
mod manifest;
mod pipeline;
mod projection;
mod stage;
mod status;
mod transition;

pub use error::{
    LifecycleDomainError, ParseEnforcementModeError, ParseGateOutcomeError,
    ParsePipelineStatusError, ParseStageError, ParseStageStatusError,
};
pub use gate::{EnforcementMode, GateCheck};
pub use ids::EpicId;
pub use manifest::{EpicManifest, GateRecord, ManifestStage, StageStart};
pub use pipeline::{
    PipelineContext, StageRecord, Transition, TransitionOutcome, TransitionValidation,
};
pub use projection::{
    GateRow, ManifestProjection, PipelineRow, StageRow, gate_row_id, pipeline_row_id, stage_row_id,
};
pub use stage::{ALL_STAGES, Stage, StageCategory, StageDefinition, list_stages};
pub use status::{ALL_STAGE_STATUSES, GateOutcome, PipelineStatus, StageStatus};
pub use transition::{
    BlockerSeverity, PrerequisiteBlocker, PrerequisiteCheck, StageSelector, StatusSnapshot,
    TRANSITION_RULES, TransitionCheck, TransitionRule, check_prerequisites, check_transition,
    find_rule, join_stages,
};
