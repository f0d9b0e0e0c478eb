//! Worker loop: claim, execute, record.

use crate::executor::CommandRunner;
use crate::shutdown::ShutdownFlag;
use chrono::Utc;
use jobctl_config::Settings;
use jobctl_core::{BackoffPolicy, Job, JobState, JobctlError, JobctlResult};
use jobctl_repository::JobStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Attempts made to persist a finished job before giving up on it.
const SAVE_ATTEMPTS: u32 = 3;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Wait between claim attempts when no job is eligible.
    pub poll_interval: Duration,

    /// Maximum run time of a single command.
    pub job_timeout: Duration,

    /// Pause after an unexpected error before the next iteration.
    pub error_pause: Duration,

    /// Retry delay policy.
    pub backoff: BackoffPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            job_timeout: Duration::from_secs(300),
            error_pause: Duration::from_secs(1),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl TryFrom<&Settings> for WorkerConfig {
    type Error = JobctlError;

    fn try_from(settings: &Settings) -> Result<Self, Self::Error> {
        Ok(Self {
            poll_interval: settings.poll_interval(),
            job_timeout: settings.job_timeout(),
            error_pause: Duration::from_secs(1),
            backoff: settings.backoff()?,
        })
    }
}

/// Counters for one worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub jobs_processed: u64,
    pub jobs_failed: u64,
}

/// A single sequential worker.
///
/// Many workers, each in its own process, may run against the same store;
/// they coordinate only through [`JobStore::claim_next`].
pub struct Worker {
    /// Identifier used in logs.
    id: String,

    store: Arc<dyn JobStore>,

    runner: Arc<dyn CommandRunner>,

    config: WorkerConfig,

    shutdown: ShutdownFlag,

    /// Jobs that ran to a recorded outcome.
    jobs_processed: AtomicU64,

    /// Jobs whose outcome was a failure (retryable or dead).
    jobs_failed: AtomicU64,
}

impl Worker {
    /// Creates a worker named after the current process.
    pub fn new(
        store: Arc<dyn JobStore>,
        runner: Arc<dyn CommandRunner>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id: format!("worker-{}", std::process::id()),
            store,
            runner,
            config,
            shutdown: ShutdownFlag::new(),
            jobs_processed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
        }
    }

    /// Overrides the worker id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Uses an externally owned shutdown flag, e.g. one wired to signals.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Returns the worker id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns a handle to this worker's shutdown flag.
    #[must_use]
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Asks the loop to exit after the current iteration.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Returns the worker's counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            jobs_processed: self.jobs_processed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
        }
    }

    /// Runs until shutdown is requested, then closes the store.
    pub async fn run(&self) {
        info!(worker_id = %self.id, "Worker started");

        while !self.shutdown.is_triggered() {
            match self.run_once().await {
                Ok(Some(_)) => {}
                Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                Err(e) => {
                    error!(worker_id = %self.id, error = %e, code = e.error_code(), "Worker iteration failed");
                    tokio::time::sleep(self.config.error_pause).await;
                }
            }
        }

        self.store.close().await;
        let stats = self.stats();
        info!(
            worker_id = %self.id,
            jobs_processed = stats.jobs_processed,
            jobs_failed = stats.jobs_failed,
            "Worker stopped"
        );
    }

    /// Claims and executes at most one job.
    ///
    /// Returns the job as saved, or `None` if nothing was eligible.
    pub async fn run_once(&self) -> JobctlResult<Option<Job>> {
        let Some(mut job) = self.store.claim_next(Utc::now()).await? else {
            return Ok(None);
        };

        info!(
            worker_id = %self.id,
            job_id = %job.id,
            attempt = job.attempts,
            command = %job.command,
            "Processing job"
        );

        let outcome = self.runner.run(&job.command, self.config.job_timeout).await;
        let state = job.record_outcome(&outcome, &self.config.backoff, Utc::now())?;
        self.persist(&mut job).await?;

        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
        match state {
            JobState::Completed => {
                info!(worker_id = %self.id, job_id = %job.id, "Job completed");
            }
            JobState::Failed => {
                self.jobs_failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker_id = %self.id,
                    job_id = %job.id,
                    attempt = job.attempts,
                    exit_code = outcome.exit_code,
                    next_retry_at = ?job.next_retry_at,
                    "Job failed, retry scheduled"
                );
            }
            JobState::Dead => {
                self.jobs_failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker_id = %self.id,
                    job_id = %job.id,
                    attempts = job.attempts,
                    exit_code = outcome.exit_code,
                    "Job moved to dead letter queue"
                );
            }
            other => {
                debug!(worker_id = %self.id, job_id = %job.id, state = %other, "Job saved");
            }
        }

        Ok(Some(job))
    }

    // Retriable storage errors (lock timeouts) get SAVE_ATTEMPTS tries.
    async fn persist(&self, job: &mut Job) -> JobctlResult<()> {
        let mut attempt = 1;
        loop {
            match self.store.save(job).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retriable() && attempt < SAVE_ATTEMPTS => {
                    warn!(
                        worker_id = %self.id,
                        job_id = %job.id,
                        attempt,
                        error = %e,
                        "Failed to save job, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.config.error_pause).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockCommandRunner;
    use async_trait::async_trait;
    use chrono::DateTime;
    use jobctl_core::{ExecutionOutcome, JobId, StateCounts};
    use mockall::mock;

    mock! {
        Store {}

        #[async_trait]
        impl JobStore for Store {
            async fn save(&self, job: &mut Job) -> JobctlResult<()>;
            async fn create(&self, job: &Job) -> JobctlResult<bool>;
            async fn get(&self, id: &JobId) -> JobctlResult<Option<Job>>;
            async fn list(&self, state: Option<JobState>) -> JobctlResult<Vec<Job>>;
            async fn claim_next(&self, now: DateTime<Utc>) -> JobctlResult<Option<Job>>;
            async fn count_by_state(&self) -> JobctlResult<StateCounts>;
            async fn delete(&self, id: &JobId) -> JobctlResult<bool>;
            async fn close(&self);
        }
    }

    fn claimed_job(command: &str, max_retries: u32) -> Job {
        let mut job = Job::new(JobId::from("job-1"), command, max_retries, Utc::now());
        job.claim(Utc::now()).unwrap();
        job
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            job_timeout: Duration::from_secs(5),
            error_pause: Duration::from_millis(10),
            backoff: BackoffPolicy::default(),
        }
    }

    fn worker(store: MockStore, runner: MockCommandRunner) -> Worker {
        Worker::new(Arc::new(store), Arc::new(runner), fast_config()).with_id("worker-test")
    }

    #[tokio::test]
    async fn test_run_once_without_jobs() {
        let mut store = MockStore::new();
        store.expect_claim_next().times(1).returning(|_| Ok(None));
        store.expect_save().never();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();

        let worker = worker(store, runner);
        assert!(worker.run_once().await.unwrap().is_none());
        assert_eq!(worker.stats(), WorkerStats::default());
    }

    #[tokio::test]
    async fn test_successful_job_is_completed() {
        let mut store = MockStore::new();
        store
            .expect_claim_next()
            .times(1)
            .returning(|_| Ok(Some(claimed_job("echo hi", 3))));
        store.expect_save().times(1).returning(|job| {
            assert_eq!(job.state, JobState::Completed);
            assert_eq!(job.output.as_deref(), Some("hi\n"));
            Ok(())
        });

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|command, limit| command == "echo hi" && *limit == Duration::from_secs(5))
            .times(1)
            .returning(|_, _| ExecutionOutcome::new(0, "hi\n", ""));

        let worker = worker(store, runner);
        let job = worker.run_once().await.unwrap().expect("a job");
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.exit_code, Some(0));
        assert_eq!(
            worker.stats(),
            WorkerStats {
                jobs_processed: 1,
                jobs_failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_failed_job_schedules_retry() {
        let mut store = MockStore::new();
        store
            .expect_claim_next()
            .returning(|_| Ok(Some(claimed_job("exit 1", 3))));
        store.expect_save().times(1).returning(|_| Ok(()));
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| ExecutionOutcome::new(1, "", "nope"));

        let worker = worker(store, runner);
        let job = worker.run_once().await.unwrap().expect("a job");
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("nope"));
        assert!(job.next_retry_at.is_some());
        assert_eq!(worker.stats().jobs_failed, 1);
    }

    #[tokio::test]
    async fn test_timeout_on_last_attempt_goes_dead() {
        let mut store = MockStore::new();
        store
            .expect_claim_next()
            .returning(|_| Ok(Some(claimed_job("sleep 999", 0))));
        store.expect_save().times(1).returning(|job| {
            assert_eq!(job.state, JobState::Dead);
            assert_eq!(job.exit_code, Some(-1));
            Ok(())
        });
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, limit| ExecutionOutcome::timed_out(limit));

        let worker = worker(store, runner);
        let job = worker.run_once().await.unwrap().expect("a job");
        assert_eq!(job.state, JobState::Dead);
        assert_eq!(job.error.as_deref(), Some("Command timed out after 5 seconds"));
    }

    #[tokio::test]
    async fn test_save_retries_transient_storage_errors() {
        let mut store = MockStore::new();
        store
            .expect_claim_next()
            .returning(|_| Ok(Some(claimed_job("true", 3))));
        let mut calls = 0;
        store.expect_save().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(JobctlError::storage("database is locked"))
            } else {
                Ok(())
            }
        });
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| ExecutionOutcome::new(0, "", ""));

        let worker = worker(store, runner);
        let job = worker.run_once().await.unwrap().expect("a job");
        assert_eq!(job.state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_claim_error_is_propagated() {
        let mut store = MockStore::new();
        store
            .expect_claim_next()
            .returning(|_| Err(JobctlError::storage("disk I/O error")));
        let runner = MockCommandRunner::new();

        let worker = worker(store, runner);
        let err = worker.run_once().await.unwrap_err();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }

    #[tokio::test]
    async fn test_run_exits_on_stop_and_closes_store() {
        let mut store = MockStore::new();
        store.expect_claim_next().returning(|_| Ok(None));
        store.expect_close().times(1).returning(|| ());
        let runner = MockCommandRunner::new();

        let worker = Arc::new(worker(store, runner));
        let handle = tokio::spawn({
            let worker = worker.clone();
            async move { worker.run().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_survives_iteration_errors() {
        let mut store = MockStore::new();
        let flag = ShutdownFlag::new();
        let trigger = flag.clone();
        let mut calls = 0;
        store.expect_claim_next().returning(move |_| {
            calls += 1;
            if calls >= 3 {
                trigger.trigger();
            }
            Err(JobctlError::storage("database is locked"))
        });
        store.expect_close().times(1).returning(|| ());
        let runner = MockCommandRunner::new();

        let worker = worker(store, runner).with_shutdown(flag);
        tokio::time::timeout(Duration::from_secs(5), worker.run())
            .await
            .expect("worker did not stop");
    }
}
