//! Keyword store
//!
//! Keywords are global and unique by normalized text. Inserts never fail on
//! a duplicate: `ON CONFLICT(keyword) DO NOTHING` lets a concurrent
//! discovery win, and callers re-read by text afterwards.

use cadence_common::db::{Competition, Keyword, KeywordMetrics};
use cadence_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::{timestamp_column, uuid_column};

const COLUMNS: &str = "id, keyword, search_volume, cpc, competition, competition_index, \
                       low_top_of_page_bid, high_top_of_page_bid, created_at, updated_at";

pub(crate) fn from_row(row: &SqliteRow) -> Result<Keyword> {
    let competition: Option<String> = row.try_get("competition")?;
    Ok(Keyword {
        id: uuid_column(row, "id")?,
        keyword: row.try_get("keyword")?,
        search_volume: row.try_get("search_volume")?,
        cpc: row.try_get("cpc")?,
        competition: competition
            .as_deref()
            .map(str::parse::<Competition>)
            .transpose()?,
        competition_index: row.try_get("competition_index")?,
        low_top_of_page_bid: row.try_get("low_top_of_page_bid")?,
        high_top_of_page_bid: row.try_get("high_top_of_page_bid")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

/// Existing records whose text matches any of `texts`, in store order.
///
/// `texts` are expected to be normalized already; the comparison is on
/// `lower(keyword)`.
pub async fn find_by_texts(conn: &mut SqliteConnection, texts: &[String]) -> Result<Vec<Keyword>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM keywords WHERE lower(keyword) IN (",
        COLUMNS
    ));
    let mut separated = qb.separated(", ");
    for text in texts {
        separated.push_bind(text.to_lowercase());
    }
    separated.push_unseparated(") ORDER BY rowid ASC");

    let rows = qb.build().fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Insert enriched keywords in one statement, skipping texts already stored.
///
/// Returns the number of rows actually inserted.
pub async fn insert_enriched(conn: &mut SqliteConnection, metrics: &[KeywordMetrics]) -> Result<u64> {
    if metrics.is_empty() {
        return Ok(0);
    }

    let ts = time::to_db_timestamp(time::now());
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO keywords (id, keyword, search_volume, cpc, competition, competition_index, \
         low_top_of_page_bid, high_top_of_page_bid, created_at, updated_at) ",
    );
    qb.push_values(metrics, |mut b, m| {
        b.push_bind(Uuid::new_v4().to_string())
            .push_bind(m.keyword.clone())
            .push_bind(m.search_volume)
            .push_bind(m.cpc)
            .push_bind(m.competition.map(|c| c.as_str()))
            .push_bind(m.competition_index)
            .push_bind(m.low_top_of_page_bid)
            .push_bind(m.high_top_of_page_bid)
            .push_bind(ts.clone())
            .push_bind(ts.clone());
    });
    qb.push(" ON CONFLICT(keyword) DO NOTHING");

    let result = qb.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Keyword>> {
    let row = sqlx::query(&format!("SELECT {} FROM keywords WHERE id = ?", COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// How many of `ids` exist in the store. Duplicates in `ids` count once.
pub async fn count_existing(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<i64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM keywords WHERE id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");

    let count: i64 = qb.build_query_scalar().fetch_one(&mut *conn).await?;
    Ok(count)
}

/// All keywords, alphabetically
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Keyword>> {
    let rows = sqlx::query(&format!("SELECT {} FROM keywords ORDER BY keyword ASC", COLUMNS))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        cadence_common::db::init_schema(&pool).await.unwrap();
        pool
    }

    fn metrics(keyword: &str, volume: i64) -> KeywordMetrics {
        KeywordMetrics {
            keyword: keyword.to_string(),
            search_volume: Some(volume),
            competition: Some(Competition::Medium),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_skips_existing_text() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let inserted = insert_enriched(&mut conn, &[metrics("react", 60500)])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let inserted = insert_enriched(&mut conn, &[metrics("react", 1), metrics("vue", 2)])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let found = find_by_texts(&mut conn, &["react".to_string()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].search_volume, Some(60500));
        assert_eq!(found[0].competition, Some(Competition::Medium));
    }

    #[tokio::test]
    async fn test_find_by_texts_empty_input() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(find_by_texts(&mut conn, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_existing_ignores_unknown_ids() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        insert_enriched(&mut conn, &[metrics("seo", 10)]).await.unwrap();
        let seo = find_by_texts(&mut conn, &["seo".to_string()]).await.unwrap()[0].id;

        let count = count_existing(&mut conn, &[seo, Uuid::new_v4()]).await.unwrap();
        assert_eq!(count, 1);
    }
}
