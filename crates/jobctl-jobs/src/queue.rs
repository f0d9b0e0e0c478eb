//! Producer and dead-letter operations on the job store.

use chrono::{DateTime, Utc};
use jobctl_core::validation::rules;
use jobctl_core::{Job, JobId, JobState, JobctlError, JobctlResult, StateCounts, ValidateExt};
use jobctl_repository::JobStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// A job submission.
///
/// Only `command` is required; everything else has a default.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EnqueueRequest {
    #[validate(custom(function = rules::not_blank, message = "must not be blank"))]
    pub id: Option<String>,

    #[validate(
        required(message = "is required"),
        custom(function = rules::not_blank, message = "must not be blank")
    )]
    pub command: Option<String>,

    pub attempts: Option<u32>,

    pub max_retries: Option<u32>,

    pub created_at: Option<DateTime<Utc>>,

    pub updated_at: Option<DateTime<Utc>>,
}

impl EnqueueRequest {
    /// Creates a request for `command` with all defaults.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    /// Sets an explicit job id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Parses a JSON job specification.
    pub fn from_json(json: &str) -> JobctlResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| JobctlError::validation(format!("Invalid job specification: {e}")))
    }
}

/// Job queue service.
///
/// Wraps a [`JobStore`] with the producer operation and the dead-letter
/// queue operations.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    default_max_retries: u32,
}

impl JobQueue {
    /// Creates a queue. `default_max_retries` applies to requests that do
    /// not carry their own.
    pub fn new(store: Arc<dyn JobStore>, default_max_retries: u32) -> Self {
        Self {
            store,
            default_max_retries,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Validates and stores a new pending job.
    pub async fn enqueue(&self, request: EnqueueRequest) -> JobctlResult<Job> {
        request.validate_request()?;

        let max_retries = request.max_retries.unwrap_or(self.default_max_retries);
        let attempts = request.attempts.unwrap_or(0);
        if attempts > max_retries {
            return Err(JobctlError::validation(format!(
                "attempts: must not exceed max_retries ({max_retries})"
            )));
        }

        let id = request.id.map_or_else(JobId::new, JobId::from);
        let command = request.command.unwrap_or_default();
        let created_at = request.created_at.unwrap_or_else(Utc::now);

        let mut job = Job::new(id, command, max_retries, created_at);
        job.attempts = attempts;
        job.updated_at = request.updated_at.unwrap_or(created_at);

        if !self.store.create(&job).await? {
            return Err(JobctlError::validation(format!(
                "Job with id '{}' already exists",
                job.id
            )));
        }

        info!(job_id = %job.id, command = %job.command, max_retries, "Job enqueued");
        Ok(job)
    }

    /// Finds a job by id.
    pub async fn get(&self, id: &JobId) -> JobctlResult<Job> {
        self.store.fetch(id).await
    }

    /// Lists jobs newest first, optionally restricted to one state.
    pub async fn list(&self, state: Option<JobState>) -> JobctlResult<Vec<Job>> {
        self.store.list(state).await
    }

    /// Counts jobs per state.
    pub async fn count_by_state(&self) -> JobctlResult<StateCounts> {
        self.store.count_by_state().await
    }

    /// Lists the dead-letter queue.
    pub async fn dead_letters(&self) -> JobctlResult<Vec<Job>> {
        self.store.list(Some(JobState::Dead)).await
    }

    /// Moves a dead job back to pending with a fresh retry budget.
    pub async fn retry_dead(&self, id: &JobId) -> JobctlResult<Job> {
        let mut job = self.store.fetch(id).await?;
        job.revive()?;
        self.store.save(&mut job).await?;

        info!(job_id = %job.id, "Dead job requeued");
        Ok(job)
    }

    /// Permanently deletes a dead job and returns it.
    pub async fn remove_dead(&self, id: &JobId) -> JobctlResult<Job> {
        let job = self.store.fetch(id).await?;
        if job.state != JobState::Dead {
            return Err(JobctlError::invalid_state(&job.id, JobState::Dead, job.state));
        }
        if !self.store.delete(id).await? {
            return Err(JobctlError::not_found("Job", id));
        }

        info!(job_id = %job.id, "Dead job removed");
        Ok(job)
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("default_max_retries", &self.default_max_retries)
            .finish_non_exhaustive()
    }
}
