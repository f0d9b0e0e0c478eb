//! SQLite job store implementation.

use crate::timestamp::{decode, encode};
use crate::{DatabasePool, JobStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobctl_core::{Job, JobId, JobState, JobctlError, JobctlResult, StateCounts};
use sqlx::{FromRow, SqliteConnection};
use std::sync::Arc;
use tracing::{debug, warn};

const JOB_COLUMNS: &str = "id, command, state, attempts, max_retries, created_at, updated_at, \
                           output, error, exit_code, next_retry_at";

/// SQLite job store.
#[derive(Clone, Debug)]
pub struct SqliteJobStore {
    pool: Arc<DatabasePool>,
}

impl SqliteJobStore {
    /// Creates a new SQLite job store.
    #[must_use]
    pub fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }

    // Runs inside the caller's `BEGIN IMMEDIATE`, so the write lock is held
    // from the eligibility check to the update.
    async fn claim_row(conn: &mut SqliteConnection, now: &str) -> JobctlResult<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE jobs
            SET state = 'processing',
                attempts = attempts + 1,
                next_retry_at = NULL,
                updated_at = ?1
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = 'pending'
                   OR (state = 'failed' AND next_retry_at IS NOT NULL AND next_retry_at <= ?1)
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            AND (state = 'pending'
                 OR (state = 'failed' AND next_retry_at IS NOT NULL AND next_retry_at <= ?1))
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }
}

/// Database row representation of a job.
#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    command: String,
    state: String,
    attempts: i64,
    max_retries: i64,
    created_at: String,
    updated_at: String,
    output: Option<String>,
    error: Option<String>,
    exit_code: Option<i64>,
    next_retry_at: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = JobctlError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let exit_code = row
            .exit_code
            .map(|code| {
                i32::try_from(code).map_err(|_| {
                    JobctlError::internal(format!("Invalid exit code in database: {code}"))
                })
            })
            .transpose()?;

        Ok(Job {
            state: row.state.parse::<JobState>()?,
            attempts: to_u32(row.attempts, "attempts")?,
            max_retries: to_u32(row.max_retries, "max_retries")?,
            created_at: decode(&row.created_at)?,
            updated_at: decode(&row.updated_at)?,
            next_retry_at: row.next_retry_at.as_deref().map(decode).transpose()?,
            id: JobId::from(row.id),
            command: row.command,
            output: row.output,
            error: row.error,
            exit_code,
        })
    }
}

fn to_u32(value: i64, column: &str) -> JobctlResult<u32> {
    u32::try_from(value)
        .map_err(|_| JobctlError::internal(format!("Invalid {column} in database: {value}")))
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn save(&self, job: &mut Job) -> JobctlResult<()> {
        job.updated_at = Utc::now();
        debug!(job_id = %job.id, state = %job.state, "Saving job");

        sqlx::query(
            r#"
            INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, updated_at,
                              output, error, exit_code, next_retry_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                attempts = excluded.attempts,
                max_retries = excluded.max_retries,
                updated_at = excluded.updated_at,
                output = excluded.output,
                error = excluded.error,
                exit_code = excluded.exit_code,
                next_retry_at = excluded.next_retry_at
            "#,
        )
        .bind(job.id.as_str())
        .bind(&job.command)
        .bind(job.state.as_str())
        .bind(i64::from(job.attempts))
        .bind(i64::from(job.max_retries))
        .bind(encode(&job.created_at))
        .bind(encode(&job.updated_at))
        .bind(job.output.as_deref())
        .bind(job.error.as_deref())
        .bind(job.exit_code)
        .bind(job.next_retry_at.as_ref().map(encode))
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }

    async fn create(&self, job: &Job) -> JobctlResult<bool> {
        debug!(job_id = %job.id, "Creating job");

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, updated_at,
                              output, error, exit_code, next_retry_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(job.id.as_str())
        .bind(&job.command)
        .bind(job.state.as_str())
        .bind(i64::from(job.attempts))
        .bind(i64::from(job.max_retries))
        .bind(encode(&job.created_at))
        .bind(encode(&job.updated_at))
        .bind(job.output.as_deref())
        .bind(job.error.as_deref())
        .bind(job.exit_code)
        .bind(job.next_retry_at.as_ref().map(encode))
        .execute(self.pool.inner())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, id: &JobId) -> JobctlResult<Option<Job>> {
        debug!("Finding job by id: {}", id);

        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn list(&self, state: Option<JobState>) -> JobctlResult<Vec<Job>> {
        debug!(state = ?state, "Listing jobs");

        let rows = match state {
            Some(state) => {
                sqlx::query_as::<_, JobRow>(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE state = ? \
                     ORDER BY created_at DESC, id DESC"
                ))
                .bind(state.as_str())
                .fetch_all(self.pool.inner())
                .await?
            }
            None => {
                sqlx::query_as::<_, JobRow>(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC, id DESC"
                ))
                .fetch_all(self.pool.inner())
                .await?
            }
        };

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> JobctlResult<Option<Job>> {
        let now = encode(&now);
        let mut conn = self.pool.inner().acquire().await?;

        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let claimed = async {
            let row = Self::claim_row(&mut conn, &now).await?;
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok::<_, JobctlError>(row)
        }
        .await;

        match claimed {
            Ok(row) => {
                let job = row.map(Job::try_from).transpose()?;
                if let Some(job) = &job {
                    debug!(job_id = %job.id, attempt = job.attempts, "Claimed job");
                }
                Ok(job)
            }
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    warn!(error = %rollback, "Failed to roll back claim transaction");
                }
                Err(e)
            }
        }
    }

    async fn count_by_state(&self) -> JobctlResult<StateCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs GROUP BY state")
                .fetch_all(self.pool.inner())
                .await?;

        let mut counts = StateCounts::new();
        for (state, count) in rows {
            let count = u64::try_from(count).unwrap_or(0);
            counts.set(state.parse::<JobState>()?, count);
        }
        Ok(counts)
    }

    async fn delete(&self, id: &JobId) -> JobctlResult<bool> {
        debug!("Deleting job: {}", id);

        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool.inner())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
