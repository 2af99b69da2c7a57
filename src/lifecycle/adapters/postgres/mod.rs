//! `PostgreSQL` adapter for the lifecycle mirror.

mod models;
mod repository;
mod schema;

pub use repository::{LifecyclePgPool, PostgresLifecycleMirror};
