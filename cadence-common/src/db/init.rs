//! Database initialization
//!
//! Creates the SQLite file on first run and applies the schema idempotently.
//! Every table uses `CREATE TABLE IF NOT EXISTS`, so calling this on an
//! existing database is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open (or create) the database and make sure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection options apply to every pooled connection, unlike a
    // one-off PRAGMA query which only reaches whichever connection ran it
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(250));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_organizations_table(pool).await?;
    create_content_calendars_table(pool).await?;
    create_content_items_table(pool).await?;
    create_keywords_table(pool).await?;
    create_content_calendar_keywords_table(pool).await?;
    Ok(())
}

async fn create_organizations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            domain TEXT NOT NULL,
            title TEXT,
            description TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_content_calendars_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_calendars (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL UNIQUE
                REFERENCES organizations(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_content_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_items (
            id TEXT PRIMARY KEY,
            content_calendar_id TEXT NOT NULL
                REFERENCES content_calendars(id) ON DELETE CASCADE,
            content_type TEXT NOT NULL CHECK (content_type IN ('blog', 'social_post')),
            title TEXT NOT NULL,
            body TEXT,
            publish_date TEXT NOT NULL,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Window queries filter by calendar and range over publish_date
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_content_items_calendar_publish
            ON content_items (content_calendar_id, publish_date)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_keywords_table(pool: &SqlitePool) -> Result<()> {
    // keyword text is stored normalized (lowercase), so the plain UNIQUE
    // constraint is also the case-insensitive one
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keywords (
            id TEXT PRIMARY KEY,
            keyword TEXT NOT NULL UNIQUE,
            search_volume INTEGER,
            cpc REAL,
            competition TEXT CHECK (competition IN ('LOW', 'MEDIUM', 'HIGH')),
            competition_index INTEGER,
            low_top_of_page_bid REAL,
            high_top_of_page_bid REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_content_calendar_keywords_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_calendar_keywords (
            content_calendar_id TEXT NOT NULL
                REFERENCES content_calendars(id) ON DELETE CASCADE,
            keyword_id TEXT NOT NULL
                REFERENCES keywords(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (content_calendar_id, keyword_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
