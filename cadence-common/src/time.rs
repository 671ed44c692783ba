//! Timestamp utilities
//!
//! Publish dates are day-granular: windows start at 00:00:00 UTC and
//! timestamps are persisted as second-precision RFC 3339 text with a `Z`
//! suffix, so string order in SQLite matches chronological order.

use chrono::{DateTime, Duration, NaiveTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Truncate a timestamp to 00:00:00 of the same UTC day
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Shift a timestamp by a whole number of days
pub fn add_days(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    at + Duration::days(days)
}

/// Format a timestamp for storage
pub fn to_db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp
pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}
