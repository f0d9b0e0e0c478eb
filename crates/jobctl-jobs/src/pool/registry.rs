//! PID file of tracked worker processes.

use jobctl_config::write_atomic;
use jobctl_core::JobctlResult;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persisted list of worker PIDs, one per line.
#[derive(Debug, Clone)]
pub struct PidRegistry {
    path: PathBuf,
}

impl PidRegistry {
    /// Creates a registry backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the PID file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the tracked PIDs. A missing file is an empty list; malformed
    /// lines are skipped.
    pub async fn load(&self) -> JobctlResult<Vec<u32>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pids = Vec::new();
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match line.parse::<u32>() {
                Ok(pid) if pid > 1 => {
                    if !pids.contains(&pid) {
                        pids.push(pid);
                    }
                }
                _ => warn!(path = %self.path.display(), line, "Ignoring malformed PID entry"),
            }
        }
        Ok(pids)
    }

    /// Replaces the tracked PIDs. An empty list removes the file.
    pub async fn save(&self, pids: &[u32]) -> JobctlResult<()> {
        if pids.is_empty() {
            return self.clear().await;
        }

        let mut contents = String::new();
        for pid in pids {
            contents.push_str(&pid.to_string());
            contents.push('\n');
        }
        write_atomic(&self.path, contents.as_bytes()).await?;
        debug!(path = %self.path.display(), count = pids.len(), "PID file written");
        Ok(())
    }

    /// Removes the PID file.
    pub async fn clear(&self) -> JobctlResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
