//! Flat key-value configuration document.

use crate::persist::write_atomic;
use crate::settings::{
    default_backoff_base, default_db_path, default_job_timeout, default_max_retries,
    default_pid_file, default_poll_interval,
};
use jobctl_core::{JobctlError, JobctlResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, info, warn};

/// A recognized configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    MaxRetries,
    BackoffBase,
    DbPath,
    PidFile,
    LogDir,
    WorkerPollIntervalMs,
    JobTimeoutSecs,
}

impl ConfigKey {
    /// Every key, in display order.
    pub const ALL: [Self; 7] = [
        Self::MaxRetries,
        Self::BackoffBase,
        Self::DbPath,
        Self::PidFile,
        Self::LogDir,
        Self::WorkerPollIntervalMs,
        Self::JobTimeoutSecs,
    ];

    /// Returns the key as stored in the document.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MaxRetries => "max_retries",
            Self::BackoffBase => "backoff_base",
            Self::DbPath => "db_path",
            Self::PidFile => "pid_file",
            Self::LogDir => "log_dir",
            Self::WorkerPollIntervalMs => "worker_poll_interval_ms",
            Self::JobTimeoutSecs => "job_timeout_secs",
        }
    }

    /// Built-in value used when the document has no entry for this key.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::MaxRetries => Value::from(default_max_retries()),
            Self::BackoffBase => Value::from(default_backoff_base()),
            Self::DbPath => Value::from(default_db_path()),
            Self::PidFile => Value::from(default_pid_file()),
            Self::LogDir => Value::Null,
            Self::WorkerPollIntervalMs => Value::from(default_poll_interval()),
            Self::JobTimeoutSecs => Value::from(default_job_timeout()),
        }
    }

    /// Parses and range-checks a raw value for this key.
    pub fn parse_value(self, raw: &str) -> JobctlResult<Value> {
        let raw = raw.trim();
        match self {
            Self::MaxRetries => raw
                .parse::<u32>()
                .map(Value::from)
                .map_err(|_| self.invalid(raw, "a non-negative integer")),
            Self::BackoffBase => match raw.parse::<u32>() {
                Ok(n) if n >= 1 => Ok(Value::from(n)),
                _ => Err(self.invalid(raw, "a positive integer")),
            },
            Self::WorkerPollIntervalMs | Self::JobTimeoutSecs => match raw.parse::<u64>() {
                Ok(n) if n >= 1 => Ok(Value::from(n)),
                _ => Err(self.invalid(raw, "a positive integer")),
            },
            Self::DbPath | Self::PidFile | Self::LogDir => {
                if raw.is_empty() {
                    Err(self.invalid(raw, "a non-empty path"))
                } else {
                    Ok(Value::from(raw))
                }
            }
        }
    }

    fn invalid(self, raw: &str, expected: &str) -> JobctlError {
        JobctlError::validation(format!("{self} must be {expected}, got '{raw}'"))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = JobctlError;

    /// Accepts both `max_retries` and `max-retries`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                JobctlError::validation(format!(
                    "Unknown config key '{s}'. Valid keys: {}",
                    known.join(", ")
                ))
            })
    }
}

/// Reads and edits the JSON configuration document.
///
/// Loaded once, mutated only through [`set`](Self::set), which rewrites the
/// whole document atomically.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl ConfigStore {
    /// Opens the document at `path`. A missing file is an empty document.
    pub async fn open(path: impl Into<PathBuf>) -> JobctlResult<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => serde_json::from_str::<Map<String, Value>>(&text).map_err(|e| {
                JobctlError::configuration(format!(
                    "Invalid config document {}: {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config document, using defaults");
                Map::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, values })
    }

    /// Returns the path of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored value for `key`, or its built-in default.
    #[must_use]
    pub fn get(&self, key: ConfigKey) -> Value {
        self.values
            .get(key.as_str())
            .cloned()
            .unwrap_or_else(|| key.default_value())
    }

    /// Returns the stored value for an arbitrary key, or `default` if it is
    /// absent or has the wrong type.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.values.get(key) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                warn!(key, error = %e, "Ignoring config value of unexpected type");
                default
            }),
            None => default,
        }
    }

    /// Validates `raw` for `key`, stores it, and persists the document.
    ///
    /// Nothing is written if validation fails.
    pub async fn set(&mut self, key: ConfigKey, raw: &str) -> JobctlResult<Value> {
        let value = key.parse_value(raw)?;

        let mut next = self.values.clone();
        next.insert(key.as_str().to_string(), value.clone());
        let body = serde_json::to_vec_pretty(&next)?;
        write_atomic(&self.path, &body).await?;
        self.values = next;

        info!(key = %key, value = %value, path = %self.path.display(), "Configuration updated");
        Ok(value)
    }

    /// Returns the effective value of every recognized key.
    #[must_use]
    pub fn entries(&self) -> Vec<(ConfigKey, Value)> {
        ConfigKey::ALL.into_iter().map(|k| (k, self.get(k))).collect()
    }
}
