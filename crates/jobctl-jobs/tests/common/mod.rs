//! Common test infrastructure for queue and worker integration tests.

#![allow(dead_code)]

use jobctl_config::DatabaseConfig;
use jobctl_core::BackoffPolicy;
use jobctl_jobs::{JobQueue, ShellRunner, Worker, WorkerConfig};
use jobctl_repository::{create_pool, JobStore, SqliteJobStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Temporary SQLite-backed queue.
pub struct TestQueue {
    _dir: TempDir,
    pub store: Arc<dyn JobStore>,
    pub queue: JobQueue,
}

impl TestQueue {
    /// Creates a queue on a fresh database file.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = create_pool(&DatabaseConfig::new(dir.path().join("jobs.db")))
            .await
            .expect("Failed to open test database");
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool));
        let queue = JobQueue::new(Arc::clone(&store), 3);

        Self {
            _dir: dir,
            store,
            queue,
        }
    }

    /// Returns a shell worker whose retry delays are a few milliseconds.
    pub fn worker(&self) -> Worker {
        let config = WorkerConfig {
            poll_interval: Duration::from_millis(10),
            job_timeout: Duration::from_secs(10),
            error_pause: Duration::from_millis(10),
            backoff: BackoffPolicy::new(0.001).expect("valid base"),
        };
        Worker::new(
            Arc::clone(&self.store),
            Arc::new(ShellRunner::default()),
            config,
        )
        .with_id("worker-test")
    }
}
