//! Worker process pool.
//!
//! The pool launches worker processes, tracks their PIDs in a file, and
//! stops them with SIGTERM. It never talks to a worker directly.

mod backend;
mod os;
mod registry;

pub use backend::{LaunchMode, ProcessBackend};
pub use os::OsProcessBackend;
pub use registry::PidRegistry;

use jobctl_core::{JobctlError, JobctlResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of [`WorkerPool::stop`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    /// PIDs that received SIGTERM.
    pub signalled: Vec<u32>,
    /// Tracked PIDs that no longer existed.
    pub missing: Vec<u32>,
}

/// Result of [`WorkerPool::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStatus {
    pub active_count: usize,
    pub pids: Vec<u32>,
}

/// Starts, stops, and reports on worker processes.
pub struct WorkerPool {
    backend: Arc<dyn ProcessBackend>,
    registry: PidRegistry,
}

impl WorkerPool {
    /// Creates a pool.
    pub fn new(backend: Arc<dyn ProcessBackend>, registry: PidRegistry) -> Self {
        Self { backend, registry }
    }

    /// Spawns `count` workers and records their PIDs next to the still
    /// running ones already tracked.
    ///
    /// In foreground mode this waits for every spawned worker to exit and
    /// then drops their PIDs from the file. Returns the spawned PIDs.
    pub async fn start(&self, count: usize, mode: LaunchMode) -> JobctlResult<Vec<u32>> {
        if count == 0 {
            return Err(JobctlError::validation("count: must be at least 1"));
        }

        let mut tracked: Vec<u32> = self
            .registry
            .load()
            .await?
            .into_iter()
            .filter(|pid| self.backend.is_alive(*pid))
            .collect();

        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            match self.backend.spawn(mode).await {
                Ok(pid) => {
                    info!(pid, mode = ?mode, "Started worker");
                    spawned.push(pid);
                }
                Err(e) => {
                    // Keep the ones already running stoppable.
                    tracked.extend(&spawned);
                    self.registry.save(&tracked).await?;
                    return Err(e);
                }
            }
        }

        tracked.extend(&spawned);
        self.registry.save(&tracked).await?;

        if mode == LaunchMode::Foreground {
            for pid in &spawned {
                if let Err(e) = self.backend.wait(*pid).await {
                    warn!(pid, error = %e, "Failed to wait for worker");
                }
            }

            let remaining: Vec<u32> = self
                .registry
                .load()
                .await?
                .into_iter()
                .filter(|pid| !spawned.contains(pid))
                .collect();
            self.registry.save(&remaining).await?;
            info!(count = spawned.len(), "All foreground workers exited");
        }

        Ok(spawned)
    }

    /// Sends SIGTERM to every tracked worker and clears the PID file.
    ///
    /// Workers that already exited are reported in
    /// [`StopReport::missing`] rather than failing the call.
    pub async fn stop(&self) -> JobctlResult<StopReport> {
        let mut report = StopReport::default();

        for pid in self.registry.load().await? {
            match self.backend.terminate(pid) {
                Ok(()) => {
                    info!(pid, "Sent SIGTERM to worker");
                    report.signalled.push(pid);
                }
                Err(e) => {
                    debug!(pid, error = %e, "Tracked worker not running");
                    report.missing.push(pid);
                }
            }
        }

        self.registry.clear().await?;
        Ok(report)
    }

    /// Reports live workers, pruning dead PIDs from the file.
    pub async fn status(&self) -> JobctlResult<PoolStatus> {
        let tracked = self.registry.load().await?;
        let pids: Vec<u32> = tracked
            .iter()
            .copied()
            .filter(|pid| self.backend.is_alive(*pid))
            .collect();

        if pids.len() != tracked.len() {
            debug!(pruned = tracked.len() - pids.len(), "Pruning exited workers");
            self.registry.save(&pids).await?;
        }

        Ok(PoolStatus {
            active_count: pids.len(),
            pids,
        })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
