//! Port contracts for lifecycle persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by lifecycle
//! services: the canonical manifest store and the relational mirror.

pub mod manifest_store;
pub mod mirror;

pub use manifest_store::{ManifestStore, ManifestStoreError, ManifestStoreResult};
pub use mirror::{LifecycleMirror, MirrorError, MirrorResult};
