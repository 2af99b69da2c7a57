//! Relational projection of lifecycle state.
//!
//! Rows are keyed by deterministic composite identifiers so that projecting
//! the same manifest twice yields identical rows. Row timestamps come from
//! the manifest, never the wall clock.

use super::{
    ALL_STAGES, EpicId, EpicManifest, GateOutcome, PipelineContext, PipelineStatus, Stage,
    StageRecord, StageStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Returns the mirror key of an epic's pipeline row.
#[must_use]
pub fn pipeline_row_id(epic_id: &EpicId) -> String {
    format!("pipeline-{epic_id}")
}

/// Returns the mirror key of a stage row.
#[must_use]
pub fn stage_row_id(epic_id: &EpicId, stage: Stage) -> String {
    format!("stage-{epic_id}-{stage}")
}

/// Returns the mirror key of a gate result row.
#[must_use]
pub fn gate_row_id(epic_id: &EpicId, stage: Stage, gate: &str) -> String {
    format!("gate-{epic_id}-{stage}-{gate}")
}

/// Mirror row for a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRow {
    /// Composite key, `pipeline-<epic>`.
    pub id: String,
    /// Epic the pipeline tracks.
    pub epic_id: EpicId,
    /// Current stage.
    pub current_stage: Stage,
    /// Aggregate status.
    pub status: PipelineStatus,
    /// Executed transitions.
    pub transition_count: u32,
    /// Optimistic-concurrency revision.
    pub revision: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// When the pipeline reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRow {
    /// Minimal row created when a gate result arrives before any sync.
    #[must_use]
    pub fn stub(epic_id: &EpicId, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: pipeline_row_id(epic_id),
            epic_id: epic_id.clone(),
            current_stage: Stage::FIRST,
            status: PipelineStatus::Active,
            transition_count: 0,
            revision: 0,
            created_at: timestamp,
            updated_at: timestamp,
            completed_at: None,
        }
    }
}

/// Mirror row for one stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRow {
    /// Composite key, `stage-<epic>-<stage>`.
    pub id: String,
    /// Owning pipeline key.
    pub pipeline_id: String,
    /// Stage identifier.
    pub stage: Stage,
    /// Canonical order of the stage.
    pub sequence: u8,
    /// Stage status.
    pub status: StageStatus,
    /// Start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Skip timestamp.
    pub skipped_at: Option<DateTime<Utc>>,
    /// Skip reason.
    pub skip_reason: Option<String>,
    /// Assigned agent.
    pub assigned_agent: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Produced artifacts.
    pub artifacts: Vec<String>,
}

impl StageRow {
    /// Minimal `not_started` row created ahead of a gate result.
    #[must_use]
    pub fn stub(epic_id: &EpicId, stage: Stage) -> Self {
        Self::from_record(epic_id, &StageRecord::not_started(stage))
    }

    /// Builds a row from a state machine stage record.
    #[must_use]
    pub fn from_record(epic_id: &EpicId, record: &StageRecord) -> Self {
        Self {
            id: stage_row_id(epic_id, record.stage),
            pipeline_id: pipeline_row_id(epic_id),
            stage: record.stage,
            sequence: record.stage.order(),
            status: record.status,
            started_at: record.started_at,
            completed_at: record.completed_at,
            skipped_at: None,
            skip_reason: None,
            assigned_agent: record.assigned_agent.clone(),
            notes: record.notes.clone(),
            artifacts: record.artifacts.clone(),
        }
    }

    /// Converts the row back into a state machine stage record.
    #[must_use]
    pub fn to_record(&self) -> StageRecord {
        StageRecord {
            stage: self.stage,
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at.or(self.skipped_at),
            assigned_agent: self.assigned_agent.clone(),
            notes: self.notes.clone().or_else(|| self.skip_reason.clone()),
            artifacts: self.artifacts.clone(),
        }
    }
}

/// Mirror row for one gate result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRow {
    /// Composite key, `gate-<epic>-<stage>-<gate>`.
    pub id: String,
    /// Owning stage key.
    pub stage_id: String,
    /// Gate name.
    pub gate_name: String,
    /// Gate outcome.
    pub outcome: GateOutcome,
    /// When the gate was checked.
    pub checked_at: DateTime<Utc>,
    /// Agent that checked the gate.
    pub checked_by: Option<String>,
    /// Detail or failure reason.
    pub details: Option<String>,
}

/// Full set of mirror rows derived from one manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestProjection {
    /// Pipeline row.
    pub pipeline: PipelineRow,
    /// Nine stage rows in canonical order.
    pub stages: Vec<StageRow>,
    /// One row per recorded gate result.
    pub gates: Vec<GateRow>,
}

impl ManifestProjection {
    /// Projects `manifest` into mirror rows. Counters the manifest does not
    /// track are carried over from `existing`, as is a cancellation, which
    /// only the mirror records.
    #[must_use]
    pub fn from_manifest(manifest: &EpicManifest, existing: Option<&PipelineRow>) -> Self {
        let epic_id = manifest.epic_id();
        let cancelled = existing.filter(|row| row.status == PipelineStatus::Cancelled);
        let status = cancelled.map_or_else(|| manifest.aggregate_status(), |row| row.status);
        let completed_at = cancelled.map_or_else(
            || {
                (status == PipelineStatus::Completed).then(|| {
                    manifest
                        .stages()
                        .filter_map(|(_, entry)| entry.completed_at.or(entry.skipped_at))
                        .max()
                        .unwrap_or_else(|| manifest.updated_at())
                })
            },
            |row| row.completed_at,
        );

        let pipeline = PipelineRow {
            id: pipeline_row_id(epic_id),
            epic_id: epic_id.clone(),
            current_stage: manifest.current_stage().unwrap_or(Stage::LAST),
            status,
            transition_count: existing.map_or(0, |row| row.transition_count),
            revision: existing.map_or(0, |row| row.revision),
            created_at: manifest.created_at(),
            updated_at: manifest.updated_at(),
            completed_at,
        };

        let mut stages = Vec::with_capacity(ALL_STAGES.len());
        let mut gates = Vec::new();
        for stage in ALL_STAGES {
            let entry = manifest.stage(stage).cloned().unwrap_or_default();
            let stage_id = stage_row_id(epic_id, stage);
            for (gate_name, record) in &entry.gates {
                gates.push(GateRow {
                    id: gate_row_id(epic_id, stage, gate_name),
                    stage_id: stage_id.clone(),
                    gate_name: gate_name.clone(),
                    outcome: record.outcome,
                    checked_at: record.checked_at,
                    checked_by: record.checked_by.clone(),
                    details: record.details.clone(),
                });
            }
            stages.push(StageRow {
                id: stage_id,
                pipeline_id: pipeline.id.clone(),
                stage,
                sequence: stage.order(),
                status: entry.status,
                started_at: entry.started_at,
                completed_at: entry.completed_at,
                skipped_at: entry.skipped_at,
                skip_reason: entry.skip_reason,
                assigned_agent: entry.assigned_agent,
                notes: entry.notes,
                artifacts: entry.artifacts,
            });
        }

        Self {
            pipeline,
            stages,
            gates,
        }
    }
}

impl PipelineContext {
    /// Rebuilds a context from mirror rows. Stages without a row (for
    /// example behind a stub pipeline) read as `not_started`.
    #[must_use]
    pub fn from_rows(pipeline: &PipelineRow, stage_rows: &[StageRow]) -> Self {
        let mut stages: BTreeMap<Stage, StageRecord> = ALL_STAGES
            .into_iter()
            .map(|stage| (stage, StageRecord::not_started(stage)))
            .collect();
        for row in stage_rows {
            stages.insert(row.stage, row.to_record());
        }

        Self {
            pipeline_id: pipeline.epic_id.clone(),
            current_stage: pipeline.current_stage,
            status: pipeline.status,
            stages,
            transition_count: pipeline.transition_count,
            revision: pipeline.revision,
            created_at: pipeline.created_at,
            updated_at: pipeline.updated_at,
            completed_at: pipeline.completed_at,
        }
    }

    /// Returns the pipeline row for this context.
    #[must_use]
    pub fn to_pipeline_row(&self) -> PipelineRow {
        PipelineRow {
            id: pipeline_row_id(&self.pipeline_id),
            epic_id: self.pipeline_id.clone(),
            current_stage: self.current_stage,
            status: self.status,
            transition_count: self.transition_count,
            revision: self.revision,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        }
    }

    /// Returns the nine stage rows for this context.
    #[must_use]
    pub fn to_stage_rows(&self) -> Vec<StageRow> {
        self.stages
            .values()
            .map(|record| StageRow::from_record(&self.pipeline_id, record))
            .collect()
    }
}
