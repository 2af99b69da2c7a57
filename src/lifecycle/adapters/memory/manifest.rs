//! In-memory manifest store for lifecycle tests.

use crate::lifecycle::{
    domain::{EpicId, EpicManifest},
    ports::{ManifestStore, ManifestStoreError, ManifestStoreResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory manifest store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryManifestStore {
    manifests: Arc<RwLock<BTreeMap<EpicId, EpicManifest>>>,
}

impl InMemoryManifestStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl ToString) -> ManifestStoreError {
    ManifestStoreError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl ManifestStore for InMemoryManifestStore {
    async fn load(&self, epic_id: &EpicId) -> ManifestStoreResult<Option<EpicManifest>> {
        let manifests = self.manifests.read().map_err(lock_error)?;
        Ok(manifests.get(epic_id).cloned())
    }

    async fn save(&self, manifest: &EpicManifest) -> ManifestStoreResult<()> {
        let mut manifests = self.manifests.write().map_err(lock_error)?;
        manifests.insert(manifest.epic_id().clone(), manifest.clone());
        Ok(())
    }

    async fn list_epics(&self) -> ManifestStoreResult<Vec<EpicId>> {
        let manifests = self.manifests.read().map_err(lock_error)?;
        Ok(manifests.keys().cloned().collect())
    }
}
