//! On-disk manifest store.
//!
//! Each epic owns a directory under the store root holding
//! `_manifest.json`. Writes go to a temporary file that is read back and
//! parsed before the previous document is copied to a backup and the
//! temporary file is renamed over it.

use crate::lifecycle::{
    domain::{EpicId, EpicManifest},
    ports::{ManifestStore, ManifestStoreError, ManifestStoreResult},
};
use async_trait::async_trait;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io::ErrorKind;
use std::sync::Arc;

/// File name of the canonical document inside an epic directory.
pub const MANIFEST_FILE_NAME: &str = "_manifest.json";

/// File name of the previous document kept on each write.
pub const BACKUP_FILE_NAME: &str = "_manifest.json.bak";

const TEMP_FILE_NAME: &str = "_manifest.json.tmp";

/// Manifest store rooted at a capability-scoped directory.
#[derive(Debug, Clone)]
pub struct FsManifestStore {
    root: Arc<Dir>,
}

impl FsManifestStore {
    /// Opens (creating if needed) the store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestStoreError::Persistence`] when the directory cannot
    /// be created or opened.
    pub fn open(path: &Utf8Path) -> ManifestStoreResult<Self> {
        Dir::create_ambient_dir_all(path, ambient_authority())
            .map_err(ManifestStoreError::persistence)?;
        let root = Dir::open_ambient_dir(path, ambient_authority())
            .map_err(ManifestStoreError::persistence)?;
        Ok(Self::from_dir(root))
    }

    /// Wraps an already-open directory.
    #[must_use]
    pub fn from_dir(root: Dir) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    /// Returns the document path of `epic_id`, relative to the store root.
    #[must_use]
    pub fn manifest_path(epic_id: &EpicId) -> String {
        format!("{epic_id}/{MANIFEST_FILE_NAME}")
    }

    async fn run_blocking<F, T>(&self, f: F) -> ManifestStoreResult<T>
    where
        F: FnOnce(&Dir) -> ManifestStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let root = Arc::clone(&self.root);
        tokio::task::spawn_blocking(move || f(&root))
            .await
            .map_err(ManifestStoreError::persistence)?
    }
}

fn parse_manifest(epic_id: &EpicId, contents: &str) -> ManifestStoreResult<EpicManifest> {
    serde_json::from_str::<EpicManifest>(contents)
        .map(EpicManifest::normalized)
        .map_err(|err| ManifestStoreError::Corrupt {
            epic_id: epic_id.clone(),
            message: err.to_string(),
        })
}

fn read_manifest(root: &Dir, epic_id: &EpicId) -> ManifestStoreResult<Option<EpicManifest>> {
    let contents = match root.read_to_string(FsManifestStore::manifest_path(epic_id)) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ManifestStoreError::persistence(err)),
    };
    parse_manifest(epic_id, &contents).map(Some)
}

fn write_manifest(
    root: &Dir,
    manifest: &EpicManifest,
    serialized: &str,
) -> ManifestStoreResult<()> {
    let epic_id = manifest.epic_id();
    root.create_dir_all(epic_id.as_str())
        .map_err(ManifestStoreError::persistence)?;
    let epic_dir = root
        .open_dir(epic_id.as_str())
        .map_err(ManifestStoreError::persistence)?;

    epic_dir
        .write(TEMP_FILE_NAME, serialized)
        .map_err(ManifestStoreError::persistence)?;

    let written = epic_dir
        .read_to_string(TEMP_FILE_NAME)
        .map_err(ManifestStoreError::persistence)?;
    if let Err(err) = parse_manifest(epic_id, &written) {
        // The target document is left untouched.
        if let Err(remove_err) = epic_dir.remove_file(TEMP_FILE_NAME) {
            tracing::warn!(
                epic_id = %epic_id,
                error = %remove_err,
                "failed to remove invalid temporary manifest"
            );
        }
        return Err(err);
    }

    if epic_dir.exists(MANIFEST_FILE_NAME) {
        epic_dir
            .copy(MANIFEST_FILE_NAME, &epic_dir, BACKUP_FILE_NAME)
            .map_err(ManifestStoreError::persistence)?;
    }

    epic_dir
        .rename(TEMP_FILE_NAME, &epic_dir, MANIFEST_FILE_NAME)
        .map_err(ManifestStoreError::persistence)
}

fn list_epic_dirs(root: &Dir) -> ManifestStoreResult<Vec<EpicId>> {
    let mut epics = Vec::new();
    for entry_result in root.entries().map_err(ManifestStoreError::persistence)? {
        let entry = entry_result.map_err(ManifestStoreError::persistence)?;
        let is_dir = entry
            .file_type()
            .map_err(ManifestStoreError::persistence)?
            .is_dir();
        if !is_dir {
            continue;
        }
        let Ok(name) = entry.file_name() else {
            continue;
        };
        let Ok(epic_id) = EpicId::new(name.as_str()) else {
            tracing::debug!(directory = %name, "ignoring directory that is not an epic id");
            continue;
        };
        if root.exists(FsManifestStore::manifest_path(&epic_id)) {
            epics.push(epic_id);
        }
    }
    epics.sort();
    Ok(epics)
}

#[async_trait]
impl ManifestStore for FsManifestStore {
    async fn load(&self, epic_id: &EpicId) -> ManifestStoreResult<Option<EpicManifest>> {
        let lookup_id = epic_id.clone();
        self.run_blocking(move |root| read_manifest(root, &lookup_id))
            .await
    }

    async fn save(&self, manifest: &EpicManifest) -> ManifestStoreResult<()> {
        let serialized =
            serde_json::to_string_pretty(manifest).map_err(ManifestStoreError::persistence)?;
        let document = manifest.clone();
        self.run_blocking(move |root| write_manifest(root, &document, &serialized))
            .await?;
        tracing::debug!(epic_id = %manifest.epic_id(), "manifest written");
        Ok(())
    }

    async fn list_epics(&self) -> ManifestStoreResult<Vec<EpicId>> {
        self.run_blocking(list_epic_dirs).await
    }
}
