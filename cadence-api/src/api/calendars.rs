//! Content calendar endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use cadence_common::db::{ContentCalendar, ContentItem, Keyword};
use cadence_common::time;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::calendar_keywords;
use crate::db::calendars::{self, CalendarUpdate};
use crate::db::content_items::{self, NewContentItem};
use crate::utils::retry_on_lock;
use crate::{ApiError, ApiResult, AppState};

/// A calendar with its items (by publish date) and keywords
#[derive(Debug, Serialize)]
pub struct CalendarView {
    #[serde(flatten)]
    pub calendar: ContentCalendar,
    pub content_items: Vec<ContentItem>,
    pub keywords: Vec<Keyword>,
}

pub(crate) async fn load_calendar_view(
    conn: &mut SqliteConnection,
    calendar: ContentCalendar,
) -> cadence_common::Result<CalendarView> {
    let content_items = content_items::list_by_calendar(conn, calendar.id).await?;
    let keywords = calendar_keywords::keywords_for_calendar(conn, calendar.id).await?;
    Ok(CalendarView {
        calendar,
        content_items,
        keywords,
    })
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub created: usize,
    pub items: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
pub struct AddKeywordsRequest {
    pub keyword_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct KeywordChangeResponse {
    pub changed: u64,
    pub keyword_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveKeywordsRequest {
    #[serde(default)]
    pub keyword_ids: Vec<Uuid>,
    /// Unlink every keyword; `keyword_ids` is ignored
    #[serde(default)]
    pub all: bool,
}

async fn require_calendar(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> ApiResult<ContentCalendar> {
    calendars::find_by_id(conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Content calendar {}", id)))
}

/// GET /content-calendars/:id
pub async fn get_calendar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CalendarView>> {
    let mut conn = state.conn().await?;
    let calendar = require_calendar(&mut conn, id).await?;
    Ok(Json(load_calendar_view(&mut conn, calendar).await?))
}

/// PATCH /content-calendars/:id
pub async fn update_calendar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<CalendarUpdate>,
) -> ApiResult<Json<ContentCalendar>> {
    let state = &state;
    let changes = &changes;
    let calendar = retry_on_lock("update calendar", state.max_lock_wait_ms, || async move {
        let mut conn = state.conn().await?;
        calendars::update(&mut conn, id, changes).await
    })
    .await?;

    Ok(Json(calendar))
}

/// POST /content-calendars/:id/generate
///
/// Tops up the calendar's window. Concurrent requests for the same calendar
/// run one after another.
pub async fn generate_content(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GenerateResponse>> {
    let _guard = state.calendar_locks.acquire(id).await;

    let prepared = {
        let mut conn = state.conn().await?;
        state
            .scheduler
            .prepare_top_up(&mut conn, id, time::now())
            .await
    };
    let pending = match prepared {
        Ok(Some(pending)) => pending,
        Ok(None) => {
            return Ok(Json(GenerateResponse {
                created: 0,
                items: Vec::new(),
            }))
        }
        Err(e) => return Err(state.note_failure(e).await),
    };

    // Only the insert is retried; the generator is not called again
    let state = &state;
    let pending = &pending;
    let inserted = retry_on_lock("insert generated content", state.max_lock_wait_ms, || async move {
        let mut conn = state.conn().await?;
        pending.insert(&mut conn).await
    })
    .await;
    let items = match inserted {
        Ok(items) => items,
        Err(e) => return Err(state.note_failure(e).await),
    };

    Ok(Json(GenerateResponse {
        created: items.len(),
        items,
    }))
}

/// POST /content-calendars/:id/keywords
pub async fn add_keywords(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddKeywordsRequest>,
) -> ApiResult<Json<KeywordChangeResponse>> {
    let state = &state;
    let ids = &payload.keyword_ids;
    let response = retry_on_lock("add calendar keywords", state.max_lock_wait_ms, || async move {
        let mut conn = state.conn().await?;
        let changed = calendar_keywords::add_keywords(&mut conn, id, ids).await?;
        let keyword_count = calendar_keywords::keyword_count(&mut conn, id).await?;
        Ok::<_, cadence_common::Error>(KeywordChangeResponse {
            changed,
            keyword_count,
        })
    })
    .await?;

    Ok(Json(response))
}

/// DELETE /content-calendars/:id/keywords
///
/// **Request:** `{"keyword_ids": ["..."]}` or `{"all": true}`
pub async fn remove_keywords(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemoveKeywordsRequest>,
) -> ApiResult<Json<KeywordChangeResponse>> {
    let state = &state;
    let payload = &payload;
    let response = retry_on_lock("remove calendar keywords", state.max_lock_wait_ms, || async move {
        let mut conn = state.conn().await?;
        if calendars::find_by_id(&mut conn, id).await?.is_none() {
            return Err(cadence_common::Error::NotFound(format!("Content calendar {}", id)));
        }

        let changed = if payload.all {
            calendar_keywords::remove_all_keywords(&mut conn, id).await?
        } else {
            calendar_keywords::remove_keywords(&mut conn, id, &payload.keyword_ids).await?
        };
        let keyword_count = calendar_keywords::keyword_count(&mut conn, id).await?;
        Ok::<_, cadence_common::Error>(KeywordChangeResponse {
            changed,
            keyword_count,
        })
    })
    .await?;

    Ok(Json(response))
}

/// GET /content-calendars/:id/items
pub async fn list_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ContentItem>>> {
    let mut conn = state.conn().await?;
    require_calendar(&mut conn, id).await?;
    Ok(Json(content_items::list_by_calendar(&mut conn, id).await?))
}

/// POST /content-calendars/:id/items
pub async fn create_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(new): Json<NewContentItem>,
) -> ApiResult<(StatusCode, Json<ContentItem>)> {
    let state = &state;
    let new = &new;
    let item = retry_on_lock("create content item", state.max_lock_wait_ms, || async move {
        let mut conn = state.conn().await?;
        content_items::create(&mut conn, id, new).await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub fn calendar_routes() -> Router<AppState> {
    Router::new()
        .route("/content-calendars/:id", get(get_calendar).patch(update_calendar))
        .route("/content-calendars/:id/generate", post(generate_content))
        .route(
            "/content-calendars/:id/keywords",
            post(add_keywords).delete(remove_keywords),
        )
        .route("/content-calendars/:id/items", get(list_items).post(create_item))
}
