//! Enforcement-mode configuration.
//!
//! The mode is resolved once by the outer caller and then passed to
//! [`LifecycleService::check_gate`](crate::lifecycle::services::LifecycleService::check_gate)
//! and `start_stage` explicitly. Sources, lowest precedence first: the
//! built-in default (`strict`), `<project>/stagegate.toml`, and the
//! `STAGEGATE_ENFORCEMENT_MODE` environment variable.

use crate::lifecycle::domain::{EnforcementMode, ParseEnforcementModeError};
use camino::Utf8Path;
use config::{Config, ConfigError, Environment, File, FileFormat, Map};
use serde::Deserialize;
use thiserror::Error;

/// Project configuration file name, without extension.
pub const CONFIG_FILE_STEM: &str = "stagegate";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "STAGEGATE";

/// Errors raised while resolving lifecycle settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A configuration source could not be read or merged.
    #[error("failed to load lifecycle configuration: {0}")]
    Source(#[from] ConfigError),

    /// The configured enforcement mode is not recognized.
    #[error(transparent)]
    InvalidMode(#[from] ParseEnforcementModeError),
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    enforcement_mode: String,
}

/// Resolved lifecycle settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnforcementSettings {
    /// Gate enforcement mode.
    pub enforcement_mode: EnforcementMode,
}

impl EnforcementSettings {
    /// Loads settings for `project_dir` from the project file and the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Source`] when the project file is malformed
    /// and [`SettingsError::InvalidMode`] for an unknown mode string.
    pub fn load(project_dir: &Utf8Path) -> Result<Self, SettingsError> {
        Self::resolve(project_dir, None)
    }

    /// Loads settings using `env` in place of the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`EnforcementSettings::load`].
    pub fn with_env(
        project_dir: &Utf8Path,
        env: Map<String, String>,
    ) -> Result<Self, SettingsError> {
        Self::resolve(project_dir, Some(env))
    }

    fn resolve(
        project_dir: &Utf8Path,
        env: Option<Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        let config_path = project_dir.join(CONFIG_FILE_STEM);
        let built = Config::builder()
            .set_default("enforcement_mode", EnforcementMode::default().as_str())?
            .add_source(
                File::new(config_path.as_str(), FileFormat::Toml).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .source(env),
            )
            .build()?;

        let raw: RawSettings = built.try_deserialize()?;
        let enforcement_mode = EnforcementMode::try_from(raw.enforcement_mode.as_str())?;
        tracing::debug!(
            project_dir = %project_dir,
            enforcement_mode = %enforcement_mode,
            "resolved lifecycle enforcement mode"
        );
        Ok(Self { enforcement_mode })
    }
}
