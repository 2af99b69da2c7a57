//! In-memory adapters for lifecycle ports.

mod manifest;
mod mirror;

pub use manifest::InMemoryManifestStore;
pub use mirror::{InMemoryLifecycleMirror, MirrorRowCounts, MirrorSnapshot};
