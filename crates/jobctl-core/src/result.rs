//! Result type aliases for jobctl.

use crate::JobctlError;

/// A specialized `Result` type for jobctl operations.
pub type JobctlResult<T> = Result<T, JobctlError>;
