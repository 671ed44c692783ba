//! Organization persistence

use cadence_common::db::Organization;
use cadence_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{is_unique_violation, timestamp_column, uuid_column};

/// Fields supplied when an organization is created
#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
    pub domain: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_by: String,
}

const COLUMNS: &str =
    "id, name, slug, domain, title, description, created_by, created_at, updated_at";

fn from_row(row: &SqliteRow) -> Result<Organization> {
    Ok(Organization {
        id: uuid_column(row, "id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        domain: row.try_get("domain")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        created_by: row.try_get("created_by")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

/// Insert a new organization.
///
/// A slug that is already taken fails with `Error::Conflict`.
pub async fn create(conn: &mut SqliteConnection, new: &NewOrganization) -> Result<Organization> {
    let now = time::now();
    let ts = time::to_db_timestamp(now);
    let id = Uuid::new_v4();

    let result = sqlx::query(
        r#"
        INSERT INTO organizations (
            id, name, slug, domain, title, description, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&new.name)
    .bind(&new.slug)
    .bind(&new.domain)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.created_by)
    .bind(&ts)
    .bind(&ts)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::Conflict(format!(
                "Organization with slug '{}' already exists",
                new.slug
            )));
        }
        Err(e) => return Err(e.into()),
    }

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Organization {} vanished after insert", id)))
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Organization>> {
    let row = sqlx::query(&format!("SELECT {} FROM organizations WHERE id = ?", COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn find_by_slug(conn: &mut SqliteConnection, slug: &str) -> Result<Option<Organization>> {
    let row = sqlx::query(&format!("SELECT {} FROM organizations WHERE slug = ?", COLUMNS))
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// All organizations, oldest first
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Organization>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM organizations ORDER BY created_at ASC, rowid ASC",
        COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Delete an organization. Its calendar, items and keyword links go with it.
///
/// Returns false if no organization had this id.
pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM organizations WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
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

    fn acme() -> NewOrganization {
        NewOrganization {
            name: "acme".to_string(),
            slug: "acme".to_string(),
            domain: "acme.com".to_string(),
            title: Some("Acme Corp".to_string()),
            description: Some("Anvils and rockets".to_string()),
            created_by: "user-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let org = create(&mut conn, &acme()).await.unwrap();
        let loaded = find_by_id(&mut conn, org.id).await.unwrap().unwrap();
        assert_eq!(loaded, org);
        assert_eq!(loaded.title.as_deref(), Some("Acme Corp"));

        let by_slug = find_by_slug(&mut conn, "acme").await.unwrap().unwrap();
        assert_eq!(by_slug.id, org.id);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        create(&mut conn, &acme()).await.unwrap();
        let second = create(&mut conn, &acme()).await;
        assert!(matches!(second, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_reports_missing() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let org = create(&mut conn, &acme()).await.unwrap();
        assert!(delete(&mut conn, org.id).await.unwrap());
        assert!(!delete(&mut conn, org.id).await.unwrap());
        assert!(list(&mut conn).await.unwrap().is_empty());
    }
}
