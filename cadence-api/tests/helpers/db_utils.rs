//! Database Test Utilities

use cadence_api::db::{calendars, organizations};
use cadence_common::db::{init_database, ContentCalendar, Organization};
use sqlx::{SqliteConnection, SqlitePool};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Create a file-backed test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cadence_test.db");
    let pool = init_database(&db_path).await.unwrap();
    (temp_dir, pool)
}

/// Organization with its default calendar
pub async fn create_org_with_calendar(
    conn: &mut SqliteConnection,
    slug: &str,
) -> (Organization, ContentCalendar) {
    let org = organizations::create(
        conn,
        &organizations::NewOrganization {
            name: slug.replace('-', " "),
            slug: slug.to_string(),
            domain: format!("{}.com", slug),
            title: None,
            description: Some(format!("{} test organization", slug)),
            created_by: "user-test".to_string(),
        },
    )
    .await
    .unwrap();
    let calendar = calendars::create_default(conn, org.id).await.unwrap();
    (org, calendar)
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Insert a keyword row directly, bypassing discovery
pub async fn insert_keyword(pool: &SqlitePool, text: &str, search_volume: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO keywords (id, keyword, search_volume, created_at, updated_at)
        VALUES (?, ?, ?, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')
        "#,
    )
    .bind(id.to_string())
    .bind(text)
    .bind(search_volume)
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Hold the database write lock from another connection for `hold`.
///
/// Returns once the lock is taken. The holder's write is rolled back.
pub async fn hold_write_lock(pool: &SqlitePool, hold: Duration) -> JoinHandle<()> {
    let pool = pool.clone();
    let (locked_tx, locked_rx) = oneshot::channel();
    let holder = tokio::spawn(async move {
        let mut tx = pool.begin().await.unwrap();
        sqlx::query(
            r#"
            INSERT INTO keywords (id, keyword, created_at, updated_at)
            VALUES (?, 'lock holder', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .execute(&mut *tx)
        .await
        .unwrap();
        let _ = locked_tx.send(());
        tokio::time::sleep(hold).await;
        tx.rollback().await.unwrap();
    });
    locked_rx.await.unwrap();
    holder
}
