//! Shared environment guards and worker discovery for integration tests.

use camino::Utf8PathBuf;
use std::env;
use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard, OnceLock};

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Guard that applies a scoped environment variable update.
pub struct EnvVarGuard {
    previous: Vec<(OsString, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    /// Sets multiple environment variables for the guard lifetime.
    pub fn set_many(changes: &[(OsString, Option<OsString>)]) -> Self {
        let lock = env_lock();
        let mut previous = Vec::with_capacity(changes.len());

        for (key, value) in changes {
            previous.push((key.clone(), env::var_os(key)));
            unsafe {
                // SAFETY: the global mutex serializes environment mutations in tests.
                match value {
                    Some(new_value) => env::set_var(key, new_value),
                    None => env::remove_var(key),
                }
            }
        }

        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..) {
            unsafe {
                // SAFETY: the global mutex serializes environment mutations in tests.
                match value {
                    Some(previous) => env::set_var(&key, &previous),
                    None => env::remove_var(&key),
                }
            }
        }
    }
}

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Locates a `pg_worker` binary for clusters started as root.
///
/// Checks `PG_EMBEDDED_WORKER`, then `~/.cargo/bin`, then `PATH`.
pub fn locate_pg_worker_path() -> Option<Utf8PathBuf> {
    locate_pg_worker_from_env()
        .or_else(locate_pg_worker_in_cargo_bin)
        .or_else(locate_pg_worker_in_path)
}

fn locate_pg_worker_from_env() -> Option<Utf8PathBuf> {
    let worker_path = utf8_path_from_os(env::var_os("PG_EMBEDDED_WORKER")?.as_os_str())?;
    worker_path.is_file().then_some(worker_path)
}

fn locate_pg_worker_in_cargo_bin() -> Option<Utf8PathBuf> {
    let home = utf8_path_from_os(env::var_os("HOME")?.as_os_str())?;
    let worker_path = home.join(".cargo").join("bin").join("pg_worker");
    worker_path.is_file().then_some(worker_path)
}

fn locate_pg_worker_in_path() -> Option<Utf8PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .filter_map(|entry| utf8_path_from_os(entry.as_os_str()))
        .map(|dir| dir.join("pg_worker"))
        .find(|candidate| candidate.is_file())
}

fn utf8_path_from_os(value: &OsStr) -> Option<Utf8PathBuf> {
    Some(Utf8PathBuf::from(value.to_os_string().into_string().ok()?))
}
