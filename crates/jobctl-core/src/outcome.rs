//! Result of running a job's command once.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exit code recorded when a command could not produce one of its own.
pub const SYNTHETIC_EXIT_CODE: i32 = -1;

/// Captured result of one execution attempt.
///
/// Empty output streams are stored as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ExecutionOutcome {
    /// Creates an outcome from a finished process.
    #[must_use]
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: non_empty(stdout.into()),
            stderr: non_empty(stderr.into()),
        }
    }

    /// The command did not finish within `timeout`.
    #[must_use]
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            exit_code: SYNTHETIC_EXIT_CODE,
            stdout: None,
            stderr: Some(format!(
                "Command timed out after {} seconds",
                timeout.as_secs()
            )),
        }
    }

    /// The command could not be started, or ended without an exit status.
    #[must_use]
    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self {
            exit_code: SYNTHETIC_EXIT_CODE,
            stdout: None,
            stderr: non_empty(message.into()),
        }
    }

    /// Returns true if the command exited with status 0.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
