//! Diesel schema for the lifecycle mirror tables.

diesel::table! {
    /// One row per epic pipeline.
    lifecycle_pipelines (id) {
        /// Composite key, `pipeline-<epic>`.
        #[max_length = 100]
        id -> Varchar,
        /// Epic identifier.
        #[max_length = 64]
        epic_id -> Varchar,
        /// Current stage identifier.
        #[max_length = 50]
        current_stage -> Varchar,
        /// Aggregate pipeline status.
        #[max_length = 20]
        status -> Varchar,
        /// Executed transitions.
        transition_count -> Int4,
        /// Optimistic-concurrency revision.
        revision -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
        /// Terminal timestamp.
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// One row per pipeline stage.
    lifecycle_stages (id) {
        /// Composite key, `stage-<epic>-<stage>`.
        #[max_length = 150]
        id -> Varchar,
        /// Owning pipeline key.
        #[max_length = 100]
        pipeline_id -> Varchar,
        /// Stage identifier.
        #[max_length = 50]
        stage_name -> Varchar,
        /// Canonical stage order.
        sequence -> Int2,
        /// Stage status.
        #[max_length = 20]
        status -> Varchar,
        /// Start timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Completion timestamp.
        completed_at -> Nullable<Timestamptz>,
        /// Skip timestamp.
        skipped_at -> Nullable<Timestamptz>,
        /// Skip reason.
        skip_reason -> Nullable<Text>,
        /// Assigned agent.
        #[max_length = 255]
        assigned_agent -> Nullable<Varchar>,
        /// Free-form notes.
        notes -> Nullable<Text>,
        /// Produced artifacts as a JSON array.
        artifacts -> Jsonb,
    }
}

diesel::table! {
    /// One row per recorded gate result.
    lifecycle_gate_results (id) {
        /// Composite key, `gate-<epic>-<stage>-<gate>`.
        #[max_length = 255]
        id -> Varchar,
        /// Owning stage key.
        #[max_length = 150]
        stage_id -> Varchar,
        /// Gate name.
        #[max_length = 100]
        gate_name -> Varchar,
        /// Gate outcome.
        #[max_length = 10]
        result -> Varchar,
        /// Check timestamp.
        checked_at -> Timestamptz,
        /// Checking agent.
        #[max_length = 255]
        checked_by -> Nullable<Varchar>,
        /// Detail or failure reason.
        details -> Nullable<Text>,
    }
}

diesel::joinable!(lifecycle_stages -> lifecycle_pipelines (pipeline_id));
diesel::joinable!(lifecycle_gate_results -> lifecycle_stages (stage_id));

diesel::allow_tables_to_appear_in_same_query!(
    lifecycle_pipelines,
    lifecycle_stages,
    lifecycle_gate_results,
);
