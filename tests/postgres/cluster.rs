//! Embedded `PostgreSQL` cluster lifecycle helpers for integration tests.

use crate::test_helpers::{EnvVarGuard, locate_pg_worker_path};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use diesel::prelude::*;
use pg_embedded_setup_unpriv::worker_process_test_api::{
    WorkerOperation, WorkerRequest, WorkerRequestArgs, run as run_worker,
};
use pg_embedded_setup_unpriv::{
    ExecutionPrivileges, TestBootstrapSettings, bootstrap_for_tests, detect_execution_privileges,
};
use postgresql_embedded::{PostgreSQL, Settings, Status};
use rstest::fixture;
use std::ffi::OsString;
use std::io::Write;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tokio::runtime::Runtime;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

static SHARED_CLUSTER: OnceLock<Result<ManagedCluster, String>> = OnceLock::new();
static TEMPLATE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
static DATABASE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Shared `PostgreSQL` cluster handle for integration tests.
pub type PostgresCluster = &'static ManagedCluster;

/// Lightweight connection wrapper for building database URLs.
#[derive(Debug, Clone)]
pub struct ClusterConnection {
    settings: Settings,
}

impl ClusterConnection {
    #[must_use]
    pub fn database_url(&self, database: &str) -> String {
        self.settings.url(database)
    }
}

/// Database cloned from a template and dropped with the guard.
pub struct TemporaryDatabase {
    cluster: PostgresCluster,
    name: String,
    url: String,
}

impl TemporaryDatabase {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        drop(self.cluster.drop_database(&self.name));
    }
}

/// Managed embedded `PostgreSQL` cluster for test lifecycles.
pub struct ManagedCluster {
    bootstrap: TestBootstrapSettings,
    env_vars: Vec<(String, Option<String>)>,
    runtime: Option<Runtime>,
    postgres: Option<PostgreSQL>,
}

impl ManagedCluster {
    fn new() -> Result<Self, BoxError> {
        let worker_guard = EnvVarGuard::set_many(&worker_env_changes()?);
        let mut bootstrap = bootstrap_for_tests().map_err(|err| Box::new(err) as BoxError)?;
        drop(worker_guard);
        sync_password_from_file(&mut bootstrap.settings)?;
        let env_vars = bootstrap.environment.to_env();
        let mut cluster = Self {
            bootstrap,
            env_vars,
            runtime: None,
            postgres: None,
        };
        cluster.start()?;
        Ok(cluster)
    }

    #[must_use]
    pub fn connection(&self) -> ClusterConnection {
        ClusterConnection {
            settings: self.bootstrap.settings.clone(),
        }
    }

    /// Clones `template` into a uniquely named database.
    pub async fn temporary_database_from_template(
        &'static self,
        prefix: &str,
        template: &str,
    ) -> Result<TemporaryDatabase, BoxError> {
        let name = format!(
            "{prefix}_{pid}_{seq}",
            pid = std::process::id(),
            seq = DATABASE_COUNTER.fetch_add(1, Ordering::Relaxed),
        );
        let template_name = template.to_owned();
        let db_name = name.clone();
        tokio::task::spawn_blocking(move || {
            self.create_database_from_template(&db_name, &template_name)
        })
        .await
        .map_err(|err| Box::new(err) as BoxError)??;

        let url = self.connection().database_url(&name);
        Ok(TemporaryDatabase {
            cluster: self,
            name,
            url,
        })
    }

    pub fn create_database_from_template(
        &self,
        db_name: &str,
        template: &str,
    ) -> Result<(), BoxError> {
        let sql = format!(
            "CREATE DATABASE {} TEMPLATE {}",
            quote_identifier(db_name),
            quote_identifier(template),
        );
        self.execute_admin_sql(&sql)
    }

    pub fn drop_database(&self, db_name: &str) -> Result<(), BoxError> {
        let sql = format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            quote_identifier(db_name)
        );
        self.execute_admin_sql(&sql)
    }

    pub fn ensure_template_exists<F>(&self, template: &str, migrate: F) -> Result<(), BoxError>
    where
        F: FnOnce(&str) -> Result<(), BoxError>,
    {
        let lock = TEMPLATE_LOCK.get_or_init(|| Mutex::new(()));
        let _guard = lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if self.database_exists(template)? {
            return Ok(());
        }

        self.create_database(template)?;
        if let Err(err) = migrate(template) {
            self.drop_database(template)?;
            return Err(err);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), BoxError> {
        match self.bootstrap.privileges {
            ExecutionPrivileges::Root => self.start_via_worker(),
            ExecutionPrivileges::Unprivileged => self.start_in_process(),
        }
    }

    fn start_in_process(&mut self) -> Result<(), BoxError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| Box::new(err) as BoxError)?;
        let env_guard = EnvVarGuard::set_many(&env_vars_to_os(&self.env_vars));
        let mut postgres = PostgreSQL::new(self.bootstrap.settings.clone());
        runtime.block_on(async {
            postgres
                .setup()
                .await
                .map_err(|err| Box::new(err) as BoxError)?;
            if !matches!(postgres.status(), Status::Started) {
                postgres
                    .start()
                    .await
                    .map_err(|err| Box::new(err) as BoxError)?;
            }
            Ok::<(), BoxError>(())
        })?;
        drop(env_guard);
        self.bootstrap.settings = postgres.settings().clone();
        sync_port_from_pid(&mut self.bootstrap.settings)?;
        self.runtime = Some(runtime);
        self.postgres = Some(postgres);
        Ok(())
    }

    fn start_via_worker(&mut self) -> Result<(), BoxError> {
        self.run_worker_operation(WorkerOperation::Setup, self.bootstrap.setup_timeout)?;
        self.run_worker_operation(WorkerOperation::Start, self.bootstrap.start_timeout)?;
        sync_port_from_pid(&mut self.bootstrap.settings)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        let Some(postgres) = self.postgres.take() else {
            if matches!(self.bootstrap.privileges, ExecutionPrivileges::Root) {
                self.run_worker_operation(WorkerOperation::Stop, self.bootstrap.shutdown_timeout)?;
            }
            return Ok(());
        };

        let Some(runtime) = &self.runtime else {
            return Ok(());
        };

        runtime.block_on(async {
            postgres
                .stop()
                .await
                .map_err(|err| Box::new(err) as BoxError)
        })?;
        Ok(())
    }

    fn run_worker_operation(
        &self,
        operation: WorkerOperation,
        timeout: Duration,
    ) -> Result<(), BoxError> {
        let worker = self.bootstrap.worker_binary.as_ref().ok_or_else(|| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "PG_EMBEDDED_WORKER is not set for worker operation",
            )) as BoxError
        })?;
        let args = WorkerRequestArgs {
            worker: worker.as_path(),
            settings: &self.bootstrap.settings,
            env_vars: &self.env_vars,
            operation,
            timeout,
        };
        run_worker(&WorkerRequest::new(args)).map_err(|err| Box::new(err) as BoxError)?;
        Ok(())
    }

    fn admin_connection(&self) -> Result<PgConnection, BoxError> {
        let url = self.connection().database_url("postgres");
        PgConnection::establish(&url).map_err(|err| Box::new(err) as BoxError)
    }

    fn execute_admin_sql(&self, sql: &str) -> Result<(), BoxError> {
        let mut conn = self.admin_connection()?;
        diesel::sql_query(sql)
            .execute(&mut conn)
            .map_err(|err| Box::new(err) as BoxError)?;
        Ok(())
    }

    fn create_database(&self, db_name: &str) -> Result<(), BoxError> {
        let sql = format!("CREATE DATABASE {}", quote_identifier(db_name));
        self.execute_admin_sql(&sql)
    }

    fn database_exists(&self, db_name: &str) -> Result<bool, BoxError> {
        #[derive(diesel::QueryableByName)]
        struct ExistsRow {
            #[diesel(sql_type = diesel::sql_types::Bool)]
            exists: bool,
        }

        let mut conn = self.admin_connection()?;
        let row = diesel::sql_query(
            "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1) AS exists",
        )
        .bind::<diesel::sql_types::Text, _>(db_name)
        .get_result::<ExistsRow>(&mut conn)
        .map_err(|err| Box::new(err) as BoxError)?;
        Ok(row.exists)
    }
}

impl Drop for ManagedCluster {
    fn drop(&mut self) {
        drop(self.stop());
    }
}

/// Provides a `PostgreSQL` test cluster suitable for the current test runner.
///
/// The cluster starts once per test binary; a startup failure is reported to
/// every test that asks for it.
#[fixture]
pub fn postgres_cluster() -> Result<PostgresCluster, BoxError> {
    SHARED_CLUSTER
        .get_or_init(|| ManagedCluster::new().map_err(|err| err.to_string()))
        .as_ref()
        .map_err(|err| format!("failed to start PostgreSQL: {err}").into())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn env_vars_to_os(env_vars: &[(String, Option<String>)]) -> Vec<(OsString, Option<OsString>)> {
    env_vars
        .iter()
        .map(|(key, value)| (OsString::from(key), value.as_ref().map(OsString::from)))
        .collect()
}

fn worker_env_changes() -> Result<Vec<(OsString, Option<OsString>)>, BoxError> {
    let mut changes = Vec::new();
    if std::env::var_os("PG_PORT").is_none() {
        let listener =
            TcpListener::bind(("127.0.0.1", 0)).map_err(|err| Box::new(err) as BoxError)?;
        let port = listener
            .local_addr()
            .map(|addr| addr.port())
            .map_err(|err| Box::new(err) as BoxError)?;
        drop(listener);
        changes.push((OsString::from("PG_PORT"), Some(OsString::from(port.to_string()))));
    }

    if matches!(detect_execution_privileges(), ExecutionPrivileges::Root) {
        let worker = locate_pg_worker_path().ok_or_else(|| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "running as root needs a pg_worker binary on PG_EMBEDDED_WORKER or PATH",
            )) as BoxError
        })?;
        let prepared = prepare_pg_worker(&worker)?;
        changes.push((
            OsString::from("PG_EMBEDDED_WORKER"),
            Some(OsString::from(prepared.as_str())),
        ));
    }

    Ok(changes)
}

/// Copies the worker into the temp directory behind a wrapper that demotes
/// root to `nobody`, so the data directory is never owned by root.
fn prepare_pg_worker(worker: &Utf8Path) -> Result<Utf8PathBuf, BoxError> {
    let temp_dir = Utf8PathBuf::try_from(std::env::temp_dir())
        .map_err(|err| Box::new(err) as BoxError)?;
    let binary_name = format!("stagegate_pg_worker_{}.bin", std::process::id());
    let wrapper_name = format!("stagegate_pg_worker_{}", std::process::id());

    let (source_dir, source_name) = open_parent_dir(worker)?;
    let target_dir = open_ambient_dir(&temp_dir)?;
    for name in [&binary_name, &wrapper_name] {
        match target_dir.remove_file(name) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(Box::new(err) as BoxError),
        }
    }
    source_dir
        .copy(source_name, &target_dir, &binary_name)
        .map_err(|err| Box::new(err) as BoxError)?;

    let binary_path = temp_dir.join(&binary_name);
    let script = format!(
        concat!(
            "#!/bin/sh\n",
            "if [ \"$(id -u)\" -eq 0 ]; then\n",
            "  exec /usr/sbin/runuser -u nobody -- {worker} \"$@\"\n",
            "fi\n",
            "exec {worker} \"$@\"\n",
        ),
        worker = binary_path.as_str()
    );
    let mut wrapper = target_dir
        .create(&wrapper_name)
        .map_err(|err| Box::new(err) as BoxError)?;
    wrapper
        .write_all(script.as_bytes())
        .map_err(|err| Box::new(err) as BoxError)?;
    drop(wrapper);

    #[cfg(unix)]
    {
        use cap_std::fs::{Permissions, PermissionsExt};
        for name in [&binary_name, &wrapper_name] {
            target_dir
                .set_permissions(name, Permissions::from_mode(0o755))
                .map_err(|err| Box::new(err) as BoxError)?;
        }
    }

    Ok(temp_dir.join(wrapper_name))
}

fn open_ambient_dir(path: &Utf8Path) -> Result<Dir, BoxError> {
    Dir::open_ambient_dir(path, ambient_authority()).map_err(|err| Box::new(err) as BoxError)
}

fn open_parent_dir(path: &Utf8Path) -> Result<(Dir, &str), BoxError> {
    let file_name = path.file_name().ok_or_else(|| {
        Box::new(std::io::Error::other("path must include a file name")) as BoxError
    })?;
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    Ok((open_ambient_dir(parent)?, file_name))
}

fn sync_password_from_file(settings: &mut Settings) -> Result<(), BoxError> {
    let password_path = settings.password_file.to_string_lossy();
    let (dir, file_name) = open_parent_dir(Utf8Path::new(password_path.as_ref()))?;
    match dir.read_to_string(file_name) {
        Ok(contents) => {
            let password = contents.trim_end();
            if !password.is_empty() {
                password.clone_into(&mut settings.password);
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(Box::new(err) as BoxError),
    }
    Ok(())
}

fn sync_port_from_pid(settings: &mut Settings) -> Result<(), BoxError> {
    let data_dir = settings.data_dir.to_string_lossy();
    let dir = open_ambient_dir(Utf8Path::new(data_dir.as_ref()))?;
    let contents = match dir.read_to_string("postmaster.pid") {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(Box::new(err) as BoxError),
    };

    let Some(port) = contents
        .lines()
        .nth(3)
        .and_then(|line| line.trim().parse::<u16>().ok())
    else {
        return Ok(());
    };
    settings.port = port;
    Ok(())
}
