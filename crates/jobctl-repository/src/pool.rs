//! Database connection pool management.

use jobctl_config::DatabaseConfig;
use jobctl_core::{JobctlError, JobctlResult};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use tracing::{info, warn};

/// Database pool wrapper.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Creates a new database pool from configuration.
    ///
    /// The file is created if missing and switched to WAL journaling so
    /// readers in other worker processes do not block the writer.
    pub async fn new(config: &DatabaseConfig) -> JobctlResult<Self> {
        info!(path = %config.path.display(), "Opening SQLite database...");

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                warn!("Failed to open database: {}", e);
                JobctlError::Storage(format!("Failed to open {}: {}", config.path.display(), e))
            })?;

        info!("SQLite connection pool established");
        Ok(Self { pool })
    }

    /// Opens the database at `path` with default limits.
    pub async fn open(path: impl AsRef<Path>) -> JobctlResult<Self> {
        Self::new(&DatabaseConfig::new(path.as_ref())).await
    }

    /// Returns a reference to the underlying pool.
    #[must_use]
    pub fn inner(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if the database connection is healthy.
    pub async fn health_check(&self) -> JobctlResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| JobctlError::Storage(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> JobctlResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Closes the database pool.
    pub async fn close(&self) {
        if self.pool.is_closed() {
            return;
        }
        info!("Closing database connection pool...");
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("size", &self.pool.size())
            .field("num_idle", &self.pool.num_idle())
            .finish()
    }
}

/// Opens a database, applies migrations, and returns a shared pool.
pub async fn create_pool(config: &DatabaseConfig) -> JobctlResult<std::sync::Arc<DatabasePool>> {
    let pool = DatabasePool::new(config).await?;
    pool.run_migrations().await?;
    Ok(std::sync::Arc::new(pool))
}
