//! Diesel row models for the lifecycle mirror.

use super::schema::{lifecycle_gate_results, lifecycle_pipelines, lifecycle_stages};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Pipeline table row, used for reads and upserts.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = lifecycle_pipelines)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct PipelineRecord {
    /// Composite key.
    pub id: String,
    /// Epic identifier.
    pub epic_id: String,
    /// Current stage identifier.
    pub current_stage: String,
    /// Aggregate status.
    pub status: String,
    /// Executed transitions.
    pub transition_count: i32,
    /// Optimistic-concurrency revision.
    pub revision: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Terminal timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Stage table row, used for reads and upserts.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = lifecycle_stages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct StageRecordRow {
    /// Composite key.
    pub id: String,
    /// Owning pipeline key.
    pub pipeline_id: String,
    /// Stage identifier.
    pub stage_name: String,
    /// Canonical stage order.
    pub sequence: i16,
    /// Stage status.
    pub status: String,
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
    /// Produced artifacts as a JSON array.
    pub artifacts: Value,
}

/// Gate result table row, used for reads and upserts.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = lifecycle_gate_results)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct GateResultRow {
    /// Composite key.
    pub id: String,
    /// Owning stage key.
    pub stage_id: String,
    /// Gate name.
    pub gate_name: String,
    /// Gate outcome.
    pub result: String,
    /// Check timestamp.
    pub checked_at: DateTime<Utc>,
    /// Checking agent.
    pub checked_by: Option<String>,
    /// Detail or failure reason.
    pub details: Option<String>,
}
