//! Typed settings.

use jobctl_core::{BackoffPolicy, JobctlError, JobctlResult, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the configuration document.
pub const DEFAULT_CONFIG_PATH: &str = "jobctl_config.json";

/// Effective configuration of a jobctl process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Retries allowed for jobs enqueued without an explicit value.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential retry backoff, in seconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u32,

    /// Path of the SQLite job database.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Path of the file tracking background worker PIDs.
    #[serde(default = "default_pid_file")]
    pub pid_file: String,

    /// Directory for per-worker log files. Workers log to stderr if unset.
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Idle wait between claim attempts in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub worker_poll_interval_ms: u64,

    /// Command execution timeout in seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
            db_path: default_db_path(),
            pid_file: default_pid_file(),
            log_dir: None,
            worker_poll_interval_ms: default_poll_interval(),
            job_timeout_secs: default_job_timeout(),
        }
    }
}

pub(crate) fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

pub(crate) fn default_backoff_base() -> u32 {
    2
}

pub(crate) fn default_db_path() -> String {
    "jobctl.db".to_string()
}

pub(crate) fn default_pid_file() -> String {
    "jobctl_workers.pid".to_string()
}

pub(crate) fn default_poll_interval() -> u64 {
    1000
}

pub(crate) fn default_job_timeout() -> u64 {
    300
}

impl Settings {
    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> JobctlResult<()> {
        if self.backoff_base == 0 {
            return Err(JobctlError::configuration("backoff_base must be at least 1"));
        }
        if self.db_path.trim().is_empty() {
            return Err(JobctlError::configuration("db_path must not be empty"));
        }
        if self.pid_file.trim().is_empty() {
            return Err(JobctlError::configuration("pid_file must not be empty"));
        }
        if self.worker_poll_interval_ms == 0 {
            return Err(JobctlError::configuration(
                "worker_poll_interval_ms must be at least 1",
            ));
        }
        if self.job_timeout_secs == 0 {
            return Err(JobctlError::configuration("job_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// Returns the backoff policy.
    pub fn backoff(&self) -> JobctlResult<BackoffPolicy> {
        BackoffPolicy::new(f64::from(self.backoff_base))
    }

    /// Returns the idle poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    /// Returns the command execution timeout.
    #[must_use]
    pub const fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.db_path)
    }

    /// Returns the PID file path.
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        PathBuf::from(&self.pid_file)
    }

    /// Returns the database connection settings.
    #[must_use]
    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.db_path())
    }
}

/// SQLite connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Database file, created if missing.
    pub path: PathBuf,

    /// Maximum pooled connections per process.
    pub max_connections: u32,

    /// How long a writer waits for the database lock, in milliseconds.
    pub busy_timeout_ms: u64,

    /// How long to wait for a pooled connection, in seconds.
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Creates settings for the database at `path` with default limits.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 4,
            busy_timeout_ms: 5000,
            acquire_timeout_secs: 30,
        }
    }

    /// Returns the busy timeout.
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Returns the pool acquire timeout.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.backoff_base, 2);
        assert_eq!(settings.db_path, "jobctl.db");
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.job_timeout(), Duration::from_secs(300));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_document_falls_back_to_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"max_retries": 5}"#).unwrap();
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.backoff_base, 2);
        assert_eq!(settings.pid_file, "jobctl_workers.pid");
    }

    #[test]
    fn test_validate_rejects_zero_base() {
        let settings = Settings {
            backoff_base: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
