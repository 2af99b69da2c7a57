//! Filesystem adapters for lifecycle ports.

mod manifest;

pub use manifest::{BACKUP_FILE_NAME, FsManifestStore, MANIFEST_FILE_NAME};
