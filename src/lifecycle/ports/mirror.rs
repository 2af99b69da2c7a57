//! Port for the queryable relational mirror of lifecycle state.

use crate::lifecycle::domain::{GateRow, PipelineRow, StageRow};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Relational mirror contract over pipeline, stage, and gate-result rows.
///
/// Rows are keyed by composite string identifiers; every write is an
/// upsert so repeated projections converge.
#[async_trait]
pub trait LifecycleMirror: Send + Sync {
    /// Finds a pipeline row by key.
    async fn find_pipeline(&self, id: &str) -> MirrorResult<Option<PipelineRow>>;

    /// Lists every pipeline row ordered by key.
    async fn list_pipelines(&self) -> MirrorResult<Vec<PipelineRow>>;

    /// Inserts or replaces a pipeline row.
    async fn upsert_pipeline(&self, row: &PipelineRow) -> MirrorResult<()>;

    /// Finds a stage row by key.
    async fn find_stage(&self, id: &str) -> MirrorResult<Option<StageRow>>;

    /// Returns the stage rows of a pipeline in canonical order.
    async fn find_stages(&self, pipeline_id: &str) -> MirrorResult<Vec<StageRow>>;

    /// Inserts or replaces a stage row.
    async fn upsert_stage(&self, row: &StageRow) -> MirrorResult<()>;

    /// Returns the gate rows of a stage ordered by gate name.
    async fn find_gates(&self, stage_id: &str) -> MirrorResult<Vec<GateRow>>;

    /// Inserts or replaces a gate result row.
    async fn upsert_gate(&self, row: &GateRow) -> MirrorResult<()>;
}

/// Errors returned by mirror implementations.
#[derive(Debug, Clone, Error)]
pub enum MirrorError {
    /// A stored row holds a value the domain does not recognize.
    #[error("invalid mirror row {id}: {message}")]
    InvalidRow {
        /// Row key.
        id: String,
        /// Conversion failure.
        message: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl MirrorError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
