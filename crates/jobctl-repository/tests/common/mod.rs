//! Common test infrastructure for database integration tests.

use jobctl_config::DatabaseConfig;
use jobctl_repository::{create_pool, DatabasePool, SqliteJobStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Temporary SQLite database.
///
/// The file lives in a temporary directory removed on drop.
pub struct TestDatabase {
    _dir: TempDir,
    path: PathBuf,
    pool: Arc<DatabasePool>,
}

impl TestDatabase {
    /// Creates a fresh database file with migrations applied.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("jobs.db");
        let pool = create_pool(&DatabaseConfig::new(&path))
            .await
            .expect("Failed to open test database");
        pool.health_check().await.expect("Test database is unhealthy");

        Self {
            _dir: dir,
            path,
            pool,
        }
    }

    /// Returns a store on the shared pool.
    pub fn store(&self) -> SqliteJobStore {
        SqliteJobStore::new(Arc::clone(&self.pool))
    }

    /// Opens an independent pool on the same file, as another worker
    /// process would.
    pub async fn second_store(&self) -> SqliteJobStore {
        let pool = DatabasePool::open(&self.path)
            .await
            .expect("Failed to open second pool");
        SqliteJobStore::new(Arc::new(pool))
    }
}
