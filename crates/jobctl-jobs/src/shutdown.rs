//! Cooperative shutdown on SIGINT / SIGTERM.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared flag set when a worker should stop after its current job.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Creates an untriggered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once shutdown was requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Resolves on the first Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the error is logged and that source
/// never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing current job before exit...");
        }
        _ = terminate => {
            info!("Received terminate signal, finishing current job before exit...");
        }
    }
}

/// Spawns a task that triggers `flag` on the first shutdown signal.
pub fn install_signal_handlers(flag: ShutdownFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        flag.trigger();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_triggered());

        flag.trigger();
        assert!(clone.is_triggered());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_triggers_flag() {
        let flag = ShutdownFlag::new();
        let handle = install_signal_handlers(flag.clone());
        // Let the task register its handlers.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("signal not delivered")
            .unwrap();
        assert!(flag.is_triggered());
    }
}
