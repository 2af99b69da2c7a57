//! Shared test helpers for `PostgreSQL` mirror integration tests.

pub use super::cluster::{BoxError, PostgresCluster, postgres_cluster};
use super::cluster::{ManagedCluster, TemporaryDatabase};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use rstest::fixture;
use stagegate::lifecycle::adapters::postgres::{LifecyclePgPool, PostgresLifecycleMirror};

/// SQL that creates the lifecycle mirror tables.
pub const CREATE_LIFECYCLE_TABLES_SQL: &str =
    include_str!("../../migrations/2026-10-19-000000_create_lifecycle_tables/up.sql");

/// Template database name for the pre-migrated schema.
pub const TEMPLATE_DB: &str = "stagegate_test_template";

/// Ensures the template database exists with the schema applied.
///
/// # Errors
///
/// Returns an error if template creation or migration fails.
pub async fn ensure_template(cluster: &'static ManagedCluster) -> Result<(), BoxError> {
    tokio::task::spawn_blocking(move || {
        let connection = cluster.connection();
        cluster.ensure_template_exists(TEMPLATE_DB, move |db_name| {
            apply_migrations(&connection.database_url(db_name))
        })
    })
    .await
    .map_err(|err| Box::new(err) as BoxError)?
}

fn apply_migrations(url: &str) -> Result<(), BoxError> {
    let mut conn = PgConnection::establish(url).map_err(|err| Box::new(err) as BoxError)?;
    conn.batch_execute(CREATE_LIFECYCLE_TABLES_SQL)
        .map_err(|err| Box::new(err) as BoxError)?;
    Ok(())
}

/// Mirror backed by a fresh database cloned from the template.
pub struct PreparedMirror {
    /// Mirror under test.
    pub mirror: PostgresLifecycleMirror,
    /// Keeps the database alive for the test.
    pub temp_db: TemporaryDatabase,
}

/// Creates a fully prepared mirror with template setup complete.
///
/// # Errors
///
/// Returns an error if template creation, database setup, or pool
/// construction fails.
#[fixture]
pub async fn prepared_mirror(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<PreparedMirror, BoxError> {
    let cluster = postgres_cluster?;
    ensure_template(cluster).await?;
    let temp_db = cluster
        .temporary_database_from_template("mirror", TEMPLATE_DB)
        .await?;

    let manager = ConnectionManager::<PgConnection>::new(temp_db.url());
    let pool: LifecyclePgPool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|err| Box::new(err) as BoxError)?;
    Ok(PreparedMirror {
        mirror: PostgresLifecycleMirror::new(pool),
        temp_db,
    })
}
