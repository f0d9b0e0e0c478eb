//! Shell command execution.

use async_trait::async_trait;
use jobctl_core::{ExecutionOutcome, SYNTHETIC_EXIT_CODE};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs a job's command and captures its result.
///
/// Never fails: launch errors and timeouts are reported as an
/// [`ExecutionOutcome`] with exit code `-1`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command`, giving up after `limit`.
    async fn run(&self, command: &str, limit: Duration) -> ExecutionOutcome;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ShellRunner {
    /// Creates a runner using the given shell.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    fn process_output(output: &Output) -> ExecutionOutcome {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        match output.status.code() {
            Some(code) => ExecutionOutcome::new(code, stdout, stderr),
            None => {
                let stderr = if stderr.is_empty() {
                    let signal = output.status.signal().unwrap_or_default();
                    format!("Command terminated by signal {signal}")
                } else {
                    stderr
                };
                ExecutionOutcome::new(SYNTHETIC_EXIT_CODE, stdout, stderr)
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, limit: Duration) -> ExecutionOutcome {
        // Own process group, so a timeout can kill everything the command
        // started and a terminal Ctrl+C does not reach it.
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(shell = %self.shell, error = %e, "Failed to launch command");
                return ExecutionOutcome::launch_failure(e.to_string());
            }
        };
        let pid = child.id();

        match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let outcome = Self::process_output(&output);
                debug!(exit_code = outcome.exit_code, "Command finished");
                outcome
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to collect command output");
                ExecutionOutcome::launch_failure(e.to_string())
            }
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "Command timed out");
                if let Some(pgid) = pid.and_then(|p| i32::try_from(p).ok()) {
                    let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
                }
                ExecutionOutcome::timed_out(limit)
            }
        }
    }
}
