//! Content item endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use cadence_common::db::ContentItem;
use uuid::Uuid;

use crate::db::content_items::{self, ContentItemUpdate};
use crate::utils::retry_on_lock;
use crate::{ApiError, ApiResult, AppState};

/// GET /content-items/:id
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContentItem>> {
    let mut conn = state.conn().await?;
    content_items::find_by_id(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Content item {}", id)))
}

/// PATCH /content-items/:id
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<ContentItemUpdate>,
) -> ApiResult<Json<ContentItem>> {
    let state = &state;
    let changes = &changes;
    let item = retry_on_lock("update content item", state.max_lock_wait_ms, || async move {
        let mut conn = state.conn().await?;
        content_items::update(&mut conn, id, changes).await
    })
    .await?;

    Ok(Json(item))
}

/// DELETE /content-items/:id
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let state = &state;
    let deleted = retry_on_lock("delete content item", state.max_lock_wait_ms, || async move {
        let mut conn = state.conn().await?;
        content_items::delete(&mut conn, id).await
    })
    .await?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Content item {}", id)))
    }
}

async fn set_published(state: &AppState, id: Uuid, published: bool) -> ApiResult<Json<ContentItem>> {
    let item = retry_on_lock("set content item published", state.max_lock_wait_ms, || async move {
        let mut conn = state.conn().await?;
        content_items::set_published(&mut conn, id, published).await
    })
    .await?;

    tracing::info!(item_id = %id, published, "Content item publish state changed");
    Ok(Json(item))
}

/// POST /content-items/:id/publish
pub async fn publish_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContentItem>> {
    set_published(&state, id, true).await
}

/// POST /content-items/:id/unpublish
pub async fn unpublish_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContentItem>> {
    set_published(&state, id, false).await
}

pub fn content_item_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/content-items/:id",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route("/content-items/:id/publish", post(publish_item))
        .route("/content-items/:id/unpublish", post(unpublish_item))
}
