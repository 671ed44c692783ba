//! Calendar-keyword associations
//!
//! Join rows are unique per (calendar, keyword) through the composite
//! primary key, so associating is a set union.

use cadence_common::db::Keyword;
use cadence_common::{time, Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashSet;
use uuid::Uuid;

use super::{calendars, keywords};

/// Associate keywords with a calendar.
///
/// Duplicate ids and ids already linked are skipped. The calendar and every
/// keyword must exist; that is checked before anything is inserted.
/// Returns the number of new links.
pub async fn add_keywords(
    conn: &mut SqliteConnection,
    calendar_id: Uuid,
    keyword_ids: &[Uuid],
) -> Result<u64> {
    if calendars::find_by_id(conn, calendar_id).await?.is_none() {
        return Err(Error::NotFound(format!("Content calendar {}", calendar_id)));
    }

    let mut seen = HashSet::new();
    let unique: Vec<Uuid> = keyword_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();
    if unique.is_empty() {
        return Ok(0);
    }

    let existing = keywords::count_existing(conn, &unique).await?;
    if existing != unique.len() as i64 {
        return Err(Error::NotFound(format!(
            "{} of {} keywords",
            unique.len() as i64 - existing,
            unique.len()
        )));
    }

    let ts = time::to_db_timestamp(time::now());
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO content_calendar_keywords (content_calendar_id, keyword_id, created_at, updated_at) ",
    );
    qb.push_values(&unique, |mut b, id| {
        b.push_bind(calendar_id.to_string())
            .push_bind(id.to_string())
            .push_bind(ts.clone())
            .push_bind(ts.clone());
    });
    qb.push(" ON CONFLICT(content_calendar_id, keyword_id) DO NOTHING");

    let result = qb.build().execute(&mut *conn).await?;

    tracing::debug!(
        calendar_id = %calendar_id,
        requested = keyword_ids.len(),
        linked = result.rows_affected(),
        "Associated keywords with calendar"
    );

    Ok(result.rows_affected())
}

/// Keywords linked to a calendar, in link order
pub async fn keywords_for_calendar(
    conn: &mut SqliteConnection,
    calendar_id: Uuid,
) -> Result<Vec<Keyword>> {
    let rows = sqlx::query(
        r#"
        SELECT k.id, k.keyword, k.search_volume, k.cpc, k.competition, k.competition_index,
               k.low_top_of_page_bid, k.high_top_of_page_bid, k.created_at, k.updated_at
        FROM content_calendar_keywords ck
        JOIN keywords k ON k.id = ck.keyword_id
        WHERE ck.content_calendar_id = ?
        ORDER BY ck.rowid ASC
        "#,
    )
    .bind(calendar_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(keywords::from_row).collect()
}

pub async fn keyword_count(conn: &mut SqliteConnection, calendar_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM content_calendar_keywords WHERE content_calendar_id = ?",
    )
    .bind(calendar_id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Unlink `keyword_ids` in one statement, returning how many were linked.
///
/// Ids that are not linked are skipped.
pub async fn remove_keywords(
    conn: &mut SqliteConnection,
    calendar_id: Uuid,
    keyword_ids: &[Uuid],
) -> Result<u64> {
    if keyword_ids.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("DELETE FROM content_calendar_keywords WHERE content_calendar_id = ");
    qb.push_bind(calendar_id.to_string());
    qb.push(" AND keyword_id IN (");
    let mut separated = qb.separated(", ");
    for id in keyword_ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");

    let result = qb.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Unlink every keyword from a calendar, returning how many were linked
pub async fn remove_all_keywords(conn: &mut SqliteConnection, calendar_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM content_calendar_keywords WHERE content_calendar_id = ?")
        .bind(calendar_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
