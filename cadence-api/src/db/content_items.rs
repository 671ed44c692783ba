//! Content item persistence

use cadence_common::db::{ContentItem, ContentType};
use cadence_common::{time, Error, Result};
use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::{calendars, timestamp_column, uuid_column};

pub(crate) const COLUMNS: &str = "id, content_calendar_id, content_type, title, body, \
                                  publish_date, is_published, created_at, updated_at";

/// Fields supplied when an item is created
#[derive(Debug, Clone, Deserialize)]
pub struct NewContentItem {
    pub content_type: ContentType,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub publish_date: DateTime<Utc>,
    #[serde(default)]
    pub is_published: bool,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentItemUpdate {
    pub content_type: Option<ContentType>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub is_published: Option<bool>,
}

pub(crate) fn from_row(row: &SqliteRow) -> Result<ContentItem> {
    let content_type: String = row.try_get("content_type")?;
    Ok(ContentItem {
        id: uuid_column(row, "id")?,
        content_calendar_id: uuid_column(row, "content_calendar_id")?,
        content_type: content_type.parse()?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        publish_date: timestamp_column(row, "publish_date")?,
        is_published: row.try_get("is_published")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("Content item title must not be empty".to_string()));
    }
    Ok(())
}

/// Create a single item on an existing calendar
pub async fn create(
    conn: &mut SqliteConnection,
    calendar_id: Uuid,
    new: &NewContentItem,
) -> Result<ContentItem> {
    validate_title(&new.title)?;
    if calendars::find_by_id(conn, calendar_id).await?.is_none() {
        return Err(Error::NotFound(format!("Content calendar {}", calendar_id)));
    }

    let mut created = insert_batch(conn, calendar_id, std::slice::from_ref(new)).await?;
    created
        .pop()
        .ok_or_else(|| Error::Internal("Insert returned no content item".to_string()))
}

/// Insert many items for one calendar, all or nothing.
///
/// Runs in its own transaction, which becomes a savepoint when `conn` is
/// already inside one. The calendar is not checked here.
pub async fn insert_batch(
    conn: &mut SqliteConnection,
    calendar_id: Uuid,
    items: &[NewContentItem],
) -> Result<Vec<ContentItem>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let now = time::now();
    let ts = time::to_db_timestamp(now);
    let ids: Vec<Uuid> = items.iter().map(|_| Uuid::new_v4()).collect();

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "INSERT INTO content_items ({}) ",
        COLUMNS
    ));
    qb.push_values(ids.iter().zip(items), |mut b, (id, item)| {
        b.push_bind(id.to_string())
            .push_bind(calendar_id.to_string())
            .push_bind(item.content_type.as_str())
            .push_bind(item.title.clone())
            .push_bind(item.body.clone())
            .push_bind(time::to_db_timestamp(item.publish_date))
            .push_bind(item.is_published)
            .push_bind(ts.clone())
            .push_bind(ts.clone());
    });

    let mut tx = conn.begin().await?;
    qb.build().execute(&mut *tx).await?;
    tx.commit().await?;

    // Stored timestamps are second precision; return what a re-read would
    let stamp = time::parse_db_timestamp(&ts)?;
    Ok(ids
        .into_iter()
        .zip(items)
        .map(|(id, item)| ContentItem {
            id,
            content_calendar_id: calendar_id,
            content_type: item.content_type,
            title: item.title.clone(),
            body: item.body.clone(),
            publish_date: truncate_to_seconds(item.publish_date),
            is_published: item.is_published,
            created_at: stamp,
            updated_at: stamp,
        })
        .collect())
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap_or(at)
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<ContentItem>> {
    let row = sqlx::query(&format!("SELECT {} FROM content_items WHERE id = ?", COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// All items of a calendar, ascending by publish date
pub async fn list_by_calendar(
    conn: &mut SqliteConnection,
    calendar_id: Uuid,
) -> Result<Vec<ContentItem>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM content_items WHERE content_calendar_id = ? \
         ORDER BY publish_date ASC, rowid ASC",
        COLUMNS
    ))
    .bind(calendar_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Apply a partial update and return the stored item
pub async fn update(
    conn: &mut SqliteConnection,
    id: Uuid,
    changes: &ContentItemUpdate,
) -> Result<ContentItem> {
    if let Some(title) = &changes.title {
        validate_title(title)?;
    }

    let mut item = find_by_id(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Content item {}", id)))?;

    if let Some(content_type) = changes.content_type {
        item.content_type = content_type;
    }
    if let Some(title) = &changes.title {
        item.title = title.clone();
    }
    if let Some(body) = &changes.body {
        item.body = Some(body.clone());
    }
    if let Some(publish_date) = changes.publish_date {
        item.publish_date = publish_date;
    }
    if let Some(is_published) = changes.is_published {
        item.is_published = is_published;
    }

    sqlx::query(
        r#"
        UPDATE content_items
        SET content_type = ?, title = ?, body = ?, publish_date = ?, is_published = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(item.content_type.as_str())
    .bind(&item.title)
    .bind(&item.body)
    .bind(time::to_db_timestamp(item.publish_date))
    .bind(item.is_published)
    .bind(time::to_db_timestamp(time::now()))
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Content item {}", id)))
}

/// Set the published flag
pub async fn set_published(
    conn: &mut SqliteConnection,
    id: Uuid,
    published: bool,
) -> Result<ContentItem> {
    let changes = ContentItemUpdate {
        is_published: Some(published),
        ..Default::default()
    };
    update(conn, id, &changes).await
}

/// Returns false if no item had this id
pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM content_items WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
