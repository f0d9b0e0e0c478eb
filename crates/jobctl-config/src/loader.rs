//! Settings loader with layered sources.

use crate::settings::{Settings, DEFAULT_CONFIG_PATH};
use config::{Config, ConfigError, Environment, File, FileFormat};
use jobctl_core::JobctlError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads [`Settings`] from layered sources.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    config_path: PathBuf,
    env_prefix: String,
}

impl SettingsLoader {
    /// Creates a loader for the document at `config_path`.
    ///
    /// Sources, lowest priority first:
    /// 1. Built-in defaults
    /// 2. The JSON document at `config_path`, if present
    /// 3. Environment variables with the `JOBCTL_` prefix (`JOBCTL_MAX_RETRIES`)
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            env_prefix: "JOBCTL".to_string(),
        }
    }

    /// Loader for `jobctl_config.json` in the working directory.
    #[must_use]
    pub fn from_default_location() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }

    /// Overrides the environment variable prefix.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Returns the path of the configuration document.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Loads and validates the settings.
    pub fn load(&self) -> Result<Settings, JobctlError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        debug!(path = %self.config_path.display(), "Loading configuration");

        let settings: Settings = Config::builder()
            .add_source(
                File::from(self.config_path.as_path())
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(Environment::with_prefix(&self.env_prefix).try_parsing(true))
            .build()
            .map_err(config_error_to_jobctl_error)?
            .try_deserialize()
            .map_err(config_error_to_jobctl_error)?;

        settings.validate()?;
        Ok(settings)
    }
}

fn config_error_to_jobctl_error(err: ConfigError) -> JobctlError {
    JobctlError::Configuration(err.to_string())
}
