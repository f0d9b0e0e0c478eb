//! Process supervision interface.

use async_trait::async_trait;
use jobctl_core::JobctlResult;

/// How worker processes are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Attached to the caller's terminal; the caller waits for exit.
    Foreground,
    /// Detached: stdio discarded, own process group.
    Background,
}

/// Narrow process interface used by [`WorkerPool`](super::WorkerPool).
#[async_trait]
pub trait ProcessBackend: Send + Sync {
    /// Launches one worker process and returns its PID.
    async fn spawn(&self, mode: LaunchMode) -> JobctlResult<u32>;

    /// Waits for a foreground process spawned by this backend to exit.
    async fn wait(&self, pid: u32) -> JobctlResult<()>;

    /// Returns true if a process with this PID is running.
    fn is_alive(&self, pid: u32) -> bool;

    /// Asks the process to shut down gracefully.
    fn terminate(&self, pid: u32) -> JobctlResult<()>;
}
