//! In-memory relational mirror for lifecycle tests.

use crate::lifecycle::{
    domain::{GateRow, PipelineRow, StageRow},
    ports::{LifecycleMirror, MirrorError, MirrorResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory mirror keyed by composite row identifiers.
///
/// Writes can be switched to fail so callers can exercise best-effort
/// synchronization paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLifecycleMirror {
    state: Arc<RwLock<InMemoryMirrorState>>,
    fail_writes: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct InMemoryMirrorState {
    pipelines: BTreeMap<String, PipelineRow>,
    stages: BTreeMap<String, StageRow>,
    gates: BTreeMap<String, GateRow>,
}

/// Row counts held by an [`InMemoryLifecycleMirror`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorRowCounts {
    /// Pipeline rows.
    pub pipelines: usize,
    /// Stage rows.
    pub stages: usize,
    /// Gate result rows.
    pub gates: usize,
}

/// Point-in-time copy of an [`InMemoryLifecycleMirror`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorSnapshot {
    /// Pipeline rows.
    pub pipelines: Vec<PipelineRow>,
    /// Stage rows.
    pub stages: Vec<StageRow>,
    /// Gate result rows.
    pub gates: Vec<GateRow>,
}

impl InMemoryLifecycleMirror {
    /// Creates an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored rows per table.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Persistence`] when the state lock is poisoned.
    pub fn row_counts(&self) -> MirrorResult<MirrorRowCounts> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(MirrorRowCounts {
            pipelines: state.pipelines.len(),
            stages: state.stages.len(),
            gates: state.gates.len(),
        })
    }

    /// Returns a copy of every stored row, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Persistence`] when the state lock is poisoned.
    pub fn snapshot(&self) -> MirrorResult<MirrorSnapshot> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(MirrorSnapshot {
            pipelines: state.pipelines.values().cloned().collect(),
            stages: state.stages.values().cloned().collect(),
            gates: state.gates.values().cloned().collect(),
        })
    }

    /// Returns every gate row, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Persistence`] when the state lock is poisoned.
    pub fn all_gates(&self) -> MirrorResult<Vec<GateRow>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.gates.values().cloned().collect())
    }

    fn ensure_writable(&self) -> MirrorResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MirrorError::persistence(std::io::Error::other(
                "mirror writes disabled",
            )));
        }
        Ok(())
    }
}

fn lock_error(err: impl ToString) -> MirrorError {
    MirrorError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl LifecycleMirror for InMemoryLifecycleMirror {
    async fn find_pipeline(&self, id: &str) -> MirrorResult<Option<PipelineRow>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.pipelines.get(id).cloned())
    }

    async fn list_pipelines(&self) -> MirrorResult<Vec<PipelineRow>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.pipelines.values().cloned().collect())
    }

    async fn upsert_pipeline(&self, row: &PipelineRow) -> MirrorResult<()> {
        self.ensure_writable()?;
        let mut state = self.state.write().map_err(lock_error)?;
        state.pipelines.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn find_stage(&self, id: &str) -> MirrorResult<Option<StageRow>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.stages.get(id).cloned())
    }

    async fn find_stages(&self, pipeline_id: &str) -> MirrorResult<Vec<StageRow>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut rows: Vec<StageRow> = state
            .stages
            .values()
            .filter(|row| row.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.sequence);
        Ok(rows)
    }

    async fn upsert_stage(&self, row: &StageRow) -> MirrorResult<()> {
        self.ensure_writable()?;
        let mut state = self.state.write().map_err(lock_error)?;
        state.stages.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn find_gates(&self, stage_id: &str) -> MirrorResult<Vec<GateRow>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut rows: Vec<GateRow> = state
            .gates
            .values()
            .filter(|row| row.stage_id == stage_id)
            .cloned()
            .collect();
        rows.sort_by(|left, right| left.gate_name.cmp(&right.gate_name));
        Ok(rows)
    }

    async fn upsert_gate(&self, row: &GateRow) -> MirrorResult<()> {
        self.ensure_writable()?;
        let mut state = self.state.write().map_err(lock_error)?;
        state.gates.insert(row.id.clone(), row.clone());
        Ok(())
    }
}
