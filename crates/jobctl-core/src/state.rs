//! Job states and the transition table between them.

use crate::JobctlError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Claimed by a worker; the command is running.
    Processing,
    /// Command exited with status 0.
    Completed,
    /// Command failed; eligible again once `next_retry_at` has passed.
    Failed,
    /// Retries exhausted. Sits in the dead-letter queue until an operator acts.
    Dead,
}

impl JobState {
    /// Every state, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::Dead,
    ];

    /// Returns the storage representation of this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Dead => "dead",
        }
    }

    /// Returns true if no worker will ever move a job out of this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Dead)
    }

    /// The transition table.
    ///
    /// Returns the state reached by applying `trigger` in this state, or
    /// `None` if the transition is not allowed. Eligibility of a `Failed`
    /// job (its retry time having passed) is checked by the caller.
    #[must_use]
    pub const fn apply(self, trigger: Trigger) -> Option<Self> {
        match (self, trigger) {
            (Self::Pending | Self::Failed, Trigger::Claimed) => Some(Self::Processing),
            (Self::Processing, Trigger::Succeeded) => Some(Self::Completed),
            (Self::Processing, Trigger::FailedRetryable) => Some(Self::Failed),
            (Self::Processing, Trigger::FailedExhausted) => Some(Self::Dead),
            (Self::Dead, Trigger::Revived) => Some(Self::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = JobctlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "dead" => Ok(Self::Dead),
            other => Err(JobctlError::validation(format!("Unknown job state: {other}"))),
        }
    }
}

/// Event that moves a job between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A worker claimed the job.
    Claimed,
    /// The command exited with status 0.
    Succeeded,
    /// The command failed and retries remain.
    FailedRetryable,
    /// The command failed and no retries remain.
    FailedExhausted,
    /// An operator retried a dead job.
    Revived,
}

impl Trigger {
    /// Describes the states this trigger may fire from, for error messages.
    #[must_use]
    pub const fn expected_source(self) -> &'static str {
        match self {
            Self::Claimed => "pending or due failed",
            Self::Succeeded | Self::FailedRetryable | Self::FailedExhausted => "processing",
            Self::Revived => "dead",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Claimed => "claimed",
            Self::Succeeded => "succeeded",
            Self::FailedRetryable => "failed_retryable",
            Self::FailedExhausted => "failed_exhausted",
            Self::Revived => "revived",
        };
        f.write_str(name)
    }
}

/// Number of jobs in each state. Every state is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCounts(BTreeMap<JobState, u64>);

impl StateCounts {
    /// Creates a table with every state at zero.
    #[must_use]
    pub fn new() -> Self {
        Self(JobState::ALL.iter().map(|s| (*s, 0)).collect())
    }

    /// Sets the count for a state.
    pub fn set(&mut self, state: JobState, count: u64) {
        self.0.insert(state, count);
    }

    /// Returns the count for a state.
    #[must_use]
    pub fn get(&self, state: JobState) -> u64 {
        self.0.get(&state).copied().unwrap_or(0)
    }

    /// Returns the number of jobs across all states.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Iterates over `(state, count)` pairs in lifecycle order.
    pub fn iter(&self) -> impl Iterator<Item = (JobState, u64)> + '_ {
        self.0.iter().map(|(s, c)| (*s, *c))
    }
}

impl Default for StateCounts {
    fn default() -> Self {
        Self::new()
    }
}
