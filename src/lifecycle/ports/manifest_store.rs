//! Store port for canonical per-epic manifests.

use crate::lifecycle::domain::{EpicId, EpicManifest};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for manifest store operations.
pub type ManifestStoreResult<T> = Result<T, ManifestStoreError>;

/// Canonical manifest persistence contract.
///
/// Implementations replace documents atomically. Callers serialize
/// read-modify-write cycles per epic; the store performs no optimistic
/// locking of its own.
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Loads the manifest for `epic_id`.
    ///
    /// Returns `None` when no document exists.
    async fn load(&self, epic_id: &EpicId) -> ManifestStoreResult<Option<EpicManifest>>;

    /// Writes `manifest`, replacing any existing document for its epic.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestStoreError::Persistence`] when the write fails and
    /// [`ManifestStoreError::Corrupt`] when the written document does not
    /// read back.
    async fn save(&self, manifest: &EpicManifest) -> ManifestStoreResult<()>;

    /// Lists every epic that has a stored manifest, in identifier order.
    async fn list_epics(&self) -> ManifestStoreResult<Vec<EpicId>>;
}

/// Errors returned by manifest store implementations.
#[derive(Debug, Clone, Error)]
pub enum ManifestStoreError {
    /// A stored document could not be parsed.
    #[error("manifest for epic {epic_id} is corrupt: {message}")]
    Corrupt {
        /// Epic whose document is unreadable.
        epic_id: EpicId,
        /// Parser message.
        message: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ManifestStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
