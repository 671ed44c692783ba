//! Keyword endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use cadence_common::db::Keyword;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::keywords;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct DiscoverRequest {
    pub description: String,
}

/// POST /keywords/discover
///
/// **Request:** `{"description": "We sell handmade leather goods"}`
/// **Response:** the matching stored keywords followed by the newly enriched ones
pub async fn discover(
    State(state): State<AppState>,
    Json(payload): Json<DiscoverRequest>,
) -> ApiResult<Json<Vec<Keyword>>> {
    let mut conn = state.conn().await?;
    match state
        .discovery
        .discover_keywords(&mut conn, &payload.description)
        .await
    {
        Ok(found) => Ok(Json(found)),
        Err(e) => Err(state.note_failure(e).await),
    }
}

/// GET /keywords
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Keyword>>> {
    let mut conn = state.conn().await?;
    Ok(Json(keywords::list(&mut conn).await?))
}

/// GET /keywords/:id
pub async fn get_keyword(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Keyword>> {
    let mut conn = state.conn().await?;
    keywords::find_by_id(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Keyword {}", id)))
}

pub fn keyword_routes() -> Router<AppState> {
    Router::new()
        .route("/keywords", get(list))
        .route("/keywords/discover", post(discover))
        .route("/keywords/:id", get(get_keyword))
}
