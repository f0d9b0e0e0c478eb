//! Process wiring: settings, store, queue, and worker pool.

use crate::cli::GlobalArgs;
use jobctl_config::{Settings, SettingsLoader};
use jobctl_core::JobctlResult;
use jobctl_jobs::{JobQueue, OsProcessBackend, PidRegistry, WorkerPool};
use jobctl_repository::{create_pool, JobStore, SqliteJobStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolved configuration of one `jobctl` invocation.
#[derive(Debug, Clone)]
pub struct AppContext {
    config_path: PathBuf,
    settings: Settings,
}

impl AppContext {
    /// Loads settings from the document and environment, then applies
    /// command line overrides.
    pub fn load(global: &GlobalArgs) -> JobctlResult<Self> {
        let mut settings = SettingsLoader::new(&global.config).load()?;
        if let Some(db) = &global.db {
            settings.db_path.clone_from(db);
        }
        settings.validate()?;

        Ok(Self {
            config_path: global.config.clone(),
            settings,
        })
    }

    /// Returns the effective settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the configuration document path.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Opens the job database, applying migrations.
    pub async fn open_store(&self) -> JobctlResult<Arc<dyn JobStore>> {
        let pool = create_pool(&self.settings.database()).await?;
        Ok(Arc::new(SqliteJobStore::new(pool)))
    }

    /// Opens the job queue service.
    pub async fn queue(&self) -> JobctlResult<JobQueue> {
        let store = self.open_store().await?;
        Ok(JobQueue::new(store, self.settings.max_retries))
    }

    /// Returns the worker pool, launching workers from this binary.
    pub fn worker_pool(&self) -> JobctlResult<WorkerPool> {
        let backend = OsProcessBackend::current_exe(self.worker_args())?;
        Ok(WorkerPool::new(
            Arc::new(backend),
            PidRegistry::new(self.settings.pid_file()),
        ))
    }

    /// Arguments that make a child process run one worker against the same
    /// database and configuration.
    #[must_use]
    pub fn worker_args(&self) -> Vec<String> {
        vec![
            "--config".to_string(),
            self.config_path.display().to_string(),
            "--db".to_string(),
            self.settings.db_path.clone(),
            "worker".to_string(),
            "run".to_string(),
        ]
    }

    /// Log file for a worker process, if a log directory is configured.
    #[must_use]
    pub fn worker_log_file(&self) -> Option<PathBuf> {
        self.settings
            .log_dir
            .as_ref()
            .map(|dir| Path::new(dir).join(format!("worker-{}.log", std::process::id())))
    }
}
