//! Unified error types for all layers of jobctl.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for jobctl.
///
/// Command failures (non-zero exit, timeout, launch failure) are deliberately
/// absent here: they are business outcomes recorded on the job itself through
/// [`ExecutionOutcome`](crate::ExecutionOutcome), never raised to a caller.
#[derive(Error, Debug)]
pub enum JobctlError {
    // ============ Domain Errors ============
    /// Resource not found
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation attempted on a job in the wrong state
    #[error("Invalid state for job {id}: expected {expected}, got {actual}")]
    InvalidState {
        id: String,
        expected: String,
        actual: String,
    },

    // ============ Infrastructure Errors ============
    /// Storage error (I/O, locking, SQL)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Process control error (spawn or signal delivery)
    #[error("Process control error: {0}")]
    ProcessControl(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobctlError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::ProcessControl(_) => "PROCESS_CONTROL_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state<I, E, A>(id: I, expected: E, actual: A) -> Self
    where
        I: ToString,
        E: ToString,
        A: ToString,
    {
        Self::InvalidState {
            id: id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates a storage error.
    #[must_use]
    pub fn storage<T: Into<String>>(message: T) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a process control error.
    #[must_use]
    pub fn process_control<T: Into<String>>(message: T) -> Self {
        Self::ProcessControl(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if this error is transient and the operation may succeed later.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for JobctlError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource_type: "database_row",
                id: "unknown".to_string(),
            },
            _ => Self::Storage(err.to_string()),
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::migrate::MigrateError> for JobctlError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(format!("Migration failed: {err}"))
    }
}

impl From<std::io::Error> for JobctlError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for JobctlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(JobctlError::not_found("Job", "a1").error_code(), "NOT_FOUND");
        assert_eq!(JobctlError::validation("bad").error_code(), "VALIDATION_ERROR");
        assert_eq!(
            JobctlError::invalid_state("a1", "dead", "pending").error_code(),
            "INVALID_STATE"
        );
        assert_eq!(JobctlError::storage("locked").error_code(), "STORAGE_ERROR");
        assert_eq!(
            JobctlError::process_control("no such process").error_code(),
            "PROCESS_CONTROL_ERROR"
        );
        assert_eq!(JobctlError::internal("oops").error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_error_display() {
        let err = JobctlError::not_found("Job", "job-1");
        assert_eq!(err.to_string(), "Resource not found: Job with id job-1");

        let err = JobctlError::invalid_state("job-1", "dead", "pending");
        assert_eq!(
            err.to_string(),
            "Invalid state for job job-1: expected dead, got pending"
        );
    }

    #[test]
    fn test_retriable_errors() {
        assert!(JobctlError::storage("database is locked").is_retriable());
        assert!(!JobctlError::validation("missing command").is_retriable());
        assert!(!JobctlError::not_found("Job", "x").is_retriable());
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: JobctlError = io.into();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: JobctlError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, JobctlError::NotFound { .. }));
    }
}
