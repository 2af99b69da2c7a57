//! Application services for lifecycle orchestration.
//!
//! [`LifecycleService`] drives stage work through the canonical manifest,
//! [`MirrorSynchronizer`] projects manifests into the relational mirror, and
//! [`PipelineService`] runs state-machine transitions on mirrored pipelines.

mod error;
mod lifecycle;
mod pipeline;
mod sync;

pub use error::ErrorCode;
pub use lifecycle::{
    GateResultRequest, LifecycleService, LifecycleServiceError, LifecycleServiceResult,
    StageStartReport,
};
pub use pipeline::{
    AdvanceStageRequest, PipelineFilter, PipelineService, PipelineServiceError,
    PipelineServiceResult, PipelineStatistics,
};
pub use sync::{BackfillReport, MirrorSynchronizer, SyncError, SyncResult};
