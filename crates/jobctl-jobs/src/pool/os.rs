//! Process backend over real OS processes.

use super::backend::{LaunchMode, ProcessBackend};
use async_trait::async_trait;
use jobctl_core::{JobctlError, JobctlResult};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Launches workers by executing a program, normally this binary with
/// `worker run`.
pub struct OsProcessBackend {
    program: PathBuf,
    args: Vec<String>,
    /// Foreground children, kept so they can be awaited and reaped.
    children: Mutex<HashMap<u32, Child>>,
}

impl OsProcessBackend {
    /// Creates a backend that runs `program` with `args`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a backend that re-executes the current binary with `args`.
    pub fn current_exe(args: Vec<String>) -> JobctlResult<Self> {
        let program = std::env::current_exe().map_err(|e| {
            JobctlError::process_control(format!("Cannot locate current executable: {e}"))
        })?;
        Ok(Self::new(program, args))
    }
}

fn to_pid(pid: u32) -> Option<Pid> {
    // 0 and 1 would address the process group or init.
    i32::try_from(pid).ok().filter(|p| *p > 1).map(Pid::from_raw)
}

#[async_trait]
impl ProcessBackend for OsProcessBackend {
    async fn spawn(&self, mode: LaunchMode) -> JobctlResult<u32> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        if mode == LaunchMode::Background {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .process_group(0);
        }

        let child = command.spawn().map_err(|e| {
            JobctlError::process_control(format!(
                "Failed to launch {}: {e}",
                self.program.display()
            ))
        })?;
        let pid = child
            .id()
            .ok_or_else(|| JobctlError::process_control("Worker exited before reporting a PID"))?;

        debug!(pid, mode = ?mode, "Spawned worker process");
        if mode == LaunchMode::Foreground {
            self.children.lock().insert(pid, child);
        }
        Ok(pid)
    }

    async fn wait(&self, pid: u32) -> JobctlResult<()> {
        let child = self.children.lock().remove(&pid);
        let Some(mut child) = child else {
            return Ok(());
        };

        let status = child.wait().await.map_err(|e| {
            JobctlError::process_control(format!("Failed to wait for worker {pid}: {e}"))
        })?;
        info!(pid, status = %status, "Worker process exited");
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        let Some(pid) = to_pid(pid) else {
            return false;
        };
        match kill(pid, None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn terminate(&self, pid: u32) -> JobctlResult<()> {
        let target = to_pid(pid)
            .ok_or_else(|| JobctlError::process_control(format!("Refusing to signal PID {pid}")))?;

        kill(target, Signal::SIGTERM).map_err(|e| match e {
            Errno::ESRCH => JobctlError::process_control(format!("No such process: {pid}")),
            other => JobctlError::process_control(format!("Failed to signal {pid}: {other}")),
        })
    }
}

impl std::fmt::Debug for OsProcessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsProcessBackend")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("children", &self.children.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_pids_are_never_alive_or_signalled() {
        let backend = OsProcessBackend::new("true", Vec::new());
        assert!(!backend.is_alive(0));
        assert!(!backend.is_alive(1));
        assert!(backend.terminate(0).is_err());
        assert!(backend.terminate(1).is_err());
    }

    #[test]
    fn test_current_process_is_alive() {
        let backend = OsProcessBackend::new("true", Vec::new());
        assert!(backend.is_alive(std::process::id()));
    }

    #[tokio::test]
    async fn test_foreground_spawn_and_wait() {
        let backend = OsProcessBackend::new("sh", vec!["-c".into(), "exit 0".into()]);
        let pid = backend.spawn(LaunchMode::Foreground).await.unwrap();

        backend.wait(pid).await.unwrap();
        assert!(!backend.is_alive(pid));
        assert!(backend.terminate(pid).is_err());
    }

    #[tokio::test]
    async fn test_terminate_stops_process() {
        let backend = OsProcessBackend::new("sleep", vec!["30".into()]);
        let pid = backend.spawn(LaunchMode::Foreground).await.unwrap();
        assert!(backend.is_alive(pid));

        backend.terminate(pid).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), backend.wait(pid))
            .await
            .expect("process ignored SIGTERM")
            .unwrap();
        assert!(!backend.is_alive(pid));
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails() {
        let backend = OsProcessBackend::new("/nonexistent/jobctl", Vec::new());
        let err = backend.spawn(LaunchMode::Background).await.unwrap_err();
        assert_eq!(err.error_code(), "PROCESS_CONTROL_ERROR");
    }
}
