//! Storage interface for jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobctl_core::{Job, JobId, JobState, JobctlError, JobctlResult, StateCounts};

/// Durable, concurrently accessible job storage.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts or replaces a job by id and sets its `updated_at` to now,
    /// both in storage and on `job`. `created_at` of an existing row is
    /// never changed.
    async fn save(&self, job: &mut Job) -> JobctlResult<()>;

    /// Inserts a job if no job with the same id exists. Returns `false`
    /// without writing anything if the id is taken.
    async fn create(&self, job: &Job) -> JobctlResult<bool>;

    /// Finds a job by id.
    async fn get(&self, id: &JobId) -> JobctlResult<Option<Job>>;

    /// Lists jobs newest first, optionally restricted to one state.
    async fn list(&self, state: Option<JobState>) -> JobctlResult<Vec<Job>>;

    /// Atomically claims the oldest eligible job (pending, or failed with
    /// `next_retry_at <= now`) and returns it in `Processing`.
    ///
    /// Under concurrent callers each eligible job is returned to exactly
    /// one of them.
    async fn claim_next(&self, now: DateTime<Utc>) -> JobctlResult<Option<Job>>;

    /// Counts jobs per state. All states are present.
    async fn count_by_state(&self) -> JobctlResult<StateCounts>;

    /// Deletes a job. Returns `false` if it did not exist.
    async fn delete(&self, id: &JobId) -> JobctlResult<bool>;

    /// Releases the underlying connections.
    async fn close(&self);

    /// Finds a job by id, failing with `NotFound` if it does not exist.
    async fn fetch(&self, id: &JobId) -> JobctlResult<Job> {
        self.get(id)
            .await?
            .ok_or_else(|| JobctlError::not_found("Job", id))
    }
}
