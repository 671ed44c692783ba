//! Database access for cadence-api
//!
//! Every function takes an explicit `&mut SqliteConnection`. Callers pass a
//! pooled connection for single statements or a transaction's connection
//! when several calls must commit together.

pub mod calendar_keywords;
pub mod calendars;
pub mod content_items;
pub mod keywords;
pub mod organizations;

use cadence_common::{time, Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Parse a TEXT uuid column
pub(crate) fn uuid_column(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    Uuid::parse_str(&value)
        .map_err(|e| Error::Internal(format!("Invalid uuid in column {}: {}", column, e)))
}

/// Parse a TEXT timestamp column
pub(crate) fn timestamp_column(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    time::parse_db_timestamp(&value)
}

/// Whether an insert failed on a UNIQUE or PRIMARY KEY constraint
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
