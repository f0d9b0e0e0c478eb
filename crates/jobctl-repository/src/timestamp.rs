//! Text encoding of timestamps in the jobs table.

use chrono::{DateTime, SecondsFormat, Utc};
use jobctl_core::{JobctlError, JobctlResult};

/// Formats a timestamp as fixed-width RFC 3339 UTC with nanoseconds.
///
/// Fixed width keeps SQL string comparison equal to time comparison.
#[must_use]
pub fn encode(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses a timestamp written by [`encode`].
pub fn decode(text: &str) -> JobctlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| JobctlError::internal(format!("Invalid timestamp in database '{text}': {e}")))
}
