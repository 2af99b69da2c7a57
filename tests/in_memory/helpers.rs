//! Shared test helpers for in-memory lifecycle integration tests.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use stagegate::lifecycle::{
    adapters::memory::{InMemoryLifecycleMirror, InMemoryManifestStore},
    domain::EpicId,
    services::{LifecycleService, PipelineService},
};

/// Lifecycle service wired to in-memory adapters.
pub type TestLifecycleService =
    LifecycleService<InMemoryManifestStore, InMemoryLifecycleMirror, DefaultClock>;

/// Pipeline service wired to the in-memory mirror.
pub type TestPipelineService = PipelineService<InMemoryLifecycleMirror, DefaultClock>;

/// Both services sharing one store and one mirror.
pub struct Harness {
    /// Canonical manifest store.
    pub store: Arc<InMemoryManifestStore>,
    /// Relational mirror.
    pub mirror: Arc<InMemoryLifecycleMirror>,
    /// Manifest-backed stage operations.
    pub lifecycle: TestLifecycleService,
    /// Mirror-backed pipeline operations.
    pub pipelines: TestPipelineService,
}

/// Provides services over fresh in-memory adapters.
#[fixture]
pub fn harness() -> Harness {
    build_harness()
}

/// Wires both services over fresh in-memory adapters.
#[must_use]
pub fn build_harness() -> Harness {
    let store = Arc::new(InMemoryManifestStore::new());
    let mirror = Arc::new(InMemoryLifecycleMirror::new());
    let clock = Arc::new(DefaultClock);
    let lifecycle = LifecycleService::new(
        Arc::clone(&store),
        Arc::clone(&mirror),
        Arc::clone(&clock),
    );
    let pipelines = PipelineService::new(Arc::clone(&mirror), clock);
    Harness {
        store,
        mirror,
        lifecycle,
        pipelines,
    }
}

/// Provides the epic id used across scenarios.
#[fixture]
pub fn epic_id() -> EpicId {
    EpicId::new("E1").expect("valid epic id")
}
