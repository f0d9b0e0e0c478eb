//! The job entity.

use crate::{BackoffPolicy, ExecutionOutcome, JobState, JobctlError, JobctlResult, Trigger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default number of retries allowed after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a new random job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a job ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the job ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A shell command queued for background execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub command: String,
    pub state: JobState,
    /// Executions started so far.
    pub attempts: u32,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stdout of the latest attempt.
    pub output: Option<String>,
    /// Stderr of the latest attempt, or a synthetic failure message.
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    /// Set only while the job is `Failed`.
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a pending job.
    pub fn new(id: JobId, command: impl Into<String>, max_retries: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            command: command.into(),
            state: JobState::Pending,
            attempts: 0,
            max_retries,
            created_at: now,
            updated_at: now,
            output: None,
            error: None,
            exit_code: None,
            next_retry_at: None,
        }
    }

    /// Returns true if a worker may claim this job at `now`.
    #[must_use]
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            JobState::Pending => true,
            JobState::Failed => self.next_retry_at.is_some_and(|at| at <= now),
            _ => false,
        }
    }

    /// Returns true once a failed attempt would leave no retries.
    #[must_use]
    pub const fn retries_exhausted(&self) -> bool {
        self.attempts > self.max_retries
    }

    /// Marks the job as claimed by a worker.
    ///
    /// Mirrors what the store's atomic claim writes; used by in-memory
    /// stores.
    pub fn claim(&mut self, now: DateTime<Utc>) -> JobctlResult<()> {
        if !self.is_claimable(now) {
            return Err(self.rejected(Trigger::Claimed));
        }
        self.transition(Trigger::Claimed)?;
        self.attempts = self.attempts.saturating_add(1);
        self.next_retry_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Records the result of an execution attempt and returns the new state.
    ///
    /// Success completes the job. Failure schedules a retry after
    /// `backoff(attempts)`, or sends the job to the dead-letter queue once
    /// retries are exhausted.
    pub fn record_outcome(
        &mut self,
        outcome: &ExecutionOutcome,
        backoff: &BackoffPolicy,
        now: DateTime<Utc>,
    ) -> JobctlResult<JobState> {
        let trigger = if outcome.succeeded() {
            Trigger::Succeeded
        } else if self.retries_exhausted() {
            Trigger::FailedExhausted
        } else {
            Trigger::FailedRetryable
        };

        let state = self.transition(trigger)?;
        self.output.clone_from(&outcome.stdout);
        self.error.clone_from(&outcome.stderr);
        self.exit_code = Some(outcome.exit_code);
        self.next_retry_at = match state {
            JobState::Failed => Some(
                now.checked_add_signed(backoff.delay_for_attempt(self.attempts))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            _ => None,
        };
        Ok(state)
    }

    /// Moves a dead job back to pending with a fresh retry budget.
    ///
    /// Output and exit code of the last attempt are kept.
    pub fn revive(&mut self) -> JobctlResult<()> {
        self.transition(Trigger::Revived)?;
        self.attempts = 0;
        self.error = None;
        self.next_retry_at = None;
        Ok(())
    }

    fn transition(&mut self, trigger: Trigger) -> JobctlResult<JobState> {
        let next = self
            .state
            .apply(trigger)
            .ok_or_else(|| self.rejected(trigger))?;
        self.state = next;
        Ok(next)
    }

    fn rejected(&self, trigger: Trigger) -> JobctlError {
        JobctlError::invalid_state(&self.id, trigger.expected_source(), self.state)
    }
}
