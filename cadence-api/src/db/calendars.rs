//! Content calendar persistence
//!
//! One calendar per organization, enforced by the UNIQUE organization_id
//! column. Items and keyword links are looked up by calendar id.

use cadence_common::db::{ContentCalendar, ContentItem};
use cadence_common::{time, Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{content_items, is_unique_violation, timestamp_column, uuid_column};

pub const DEFAULT_CALENDAR_NAME: &str = "Default Calendar";
pub const DEFAULT_CALENDAR_DESCRIPTION: &str = "Default content calendar for organization";

const COLUMNS: &str = "id, organization_id, name, description, created_at, updated_at";

/// Name and description changes; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn from_row(row: &SqliteRow) -> Result<ContentCalendar> {
    Ok(ContentCalendar {
        id: uuid_column(row, "id")?,
        organization_id: uuid_column(row, "organization_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

/// Create the calendar for an organization
pub async fn create(
    conn: &mut SqliteConnection,
    organization_id: Uuid,
    name: &str,
    description: Option<&str>,
) -> Result<ContentCalendar> {
    let ts = time::to_db_timestamp(time::now());
    let id = Uuid::new_v4();

    let result = sqlx::query(
        r#"
        INSERT INTO content_calendars (id, organization_id, name, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(organization_id.to_string())
    .bind(name)
    .bind(description)
    .bind(&ts)
    .bind(&ts)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::Conflict(format!(
                "Organization {} already has a content calendar",
                organization_id
            )));
        }
        Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
            return Err(Error::NotFound(format!("Organization {}", organization_id)));
        }
        Err(e) => return Err(e.into()),
    }

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Content calendar {} vanished after insert", id)))
}

/// Create the calendar every new organization starts with
pub async fn create_default(
    conn: &mut SqliteConnection,
    organization_id: Uuid,
) -> Result<ContentCalendar> {
    create(
        conn,
        organization_id,
        DEFAULT_CALENDAR_NAME,
        Some(DEFAULT_CALENDAR_DESCRIPTION),
    )
    .await
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<ContentCalendar>> {
    let row = sqlx::query(&format!("SELECT {} FROM content_calendars WHERE id = ?", COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn find_by_organization(
    conn: &mut SqliteConnection,
    organization_id: Uuid,
) -> Result<Option<ContentCalendar>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM content_calendars WHERE organization_id = ?",
        COLUMNS
    ))
    .bind(organization_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: Uuid,
    changes: &CalendarUpdate,
) -> Result<ContentCalendar> {
    if let Some(name) = &changes.name {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("Calendar name must not be empty".to_string()));
        }
    }

    let mut calendar = find_by_id(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Content calendar {}", id)))?;

    if let Some(name) = &changes.name {
        calendar.name = name.clone();
    }
    if let Some(description) = &changes.description {
        calendar.description = Some(description.clone());
    }

    sqlx::query("UPDATE content_calendars SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&calendar.name)
        .bind(&calendar.description)
        .bind(time::to_db_timestamp(time::now()))
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Content calendar {}", id)))
}

/// Items with `publish_date` in `[window_start, window_start + window_days)`,
/// ascending by publish date
pub async fn find_items_in_window(
    conn: &mut SqliteConnection,
    calendar_id: Uuid,
    window_start: DateTime<Utc>,
    window_days: u32,
) -> Result<Vec<ContentItem>> {
    let window_end = time::add_days(window_start, i64::from(window_days));

    let rows = sqlx::query(&format!(
        "SELECT {} FROM content_items \
         WHERE content_calendar_id = ? AND publish_date >= ? AND publish_date < ? \
         ORDER BY publish_date ASC, rowid ASC",
        content_items::COLUMNS
    ))
    .bind(calendar_id.to_string())
    .bind(time::to_db_timestamp(window_start))
    .bind(time::to_db_timestamp(window_end))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(content_items::from_row).collect()
}
