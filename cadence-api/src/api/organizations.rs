//! Organization endpoints

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use cadence_common::db::Organization;
use serde::Deserialize;
use uuid::Uuid;

use super::calendars::{load_calendar_view, CalendarView};
use crate::db::{calendars, organizations};
use crate::services::{BusinessSummary, RegistrationRequest};
use crate::utils::retry_on_lock;
use crate::{ApiError, ApiResult, AppState};

/// Header carrying the authenticated user's id
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub url: String,
}

/// POST /organizations
///
/// Runs the full registration flow: organization, calendar, keywords and
/// the first content window. Responds 201 with the stored organization.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegistrationRequest>,
) -> ApiResult<(StatusCode, Json<Organization>)> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {} header", USER_ID_HEADER)))?
        .to_string();

    let organization_id = match state.registration.register(&payload, &user_id).await {
        Ok(id) => id,
        Err(e) => return Err(state.note_failure(e).await),
    };

    let mut conn = state.conn().await?;
    let organization = organizations::find_by_id(&mut conn, organization_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Organization {} missing after commit", organization_id)))?;

    Ok((StatusCode::CREATED, Json(organization)))
}

/// GET /organizations
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Organization>>> {
    let mut conn = state.conn().await?;
    Ok(Json(organizations::list(&mut conn).await?))
}

/// GET /organizations/:id
pub async fn get_organization(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Organization>> {
    let mut conn = state.conn().await?;
    organizations::find_by_id(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Organization {}", id)))
}

/// DELETE /organizations/:id
///
/// Removes the organization with its calendar, items and keyword links.
pub async fn delete_organization(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let state = &state;
    let deleted = retry_on_lock("delete organization", state.max_lock_wait_ms, || async move {
        let mut conn = state.conn().await?;
        organizations::delete(&mut conn, id).await
    })
    .await?;

    if deleted {
        tracing::info!(organization_id = %id, "Organization deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Organization {}", id)))
    }
}

/// GET /organizations/:id/content-calendar
pub async fn get_organization_calendar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CalendarView>> {
    let mut conn = state.conn().await?;
    let calendar = calendars::find_by_organization(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Content calendar for organization {}", id)))?;

    Ok(Json(load_calendar_view(&mut conn, calendar).await?))
}

/// POST /organizations/tools/generate-summary
///
/// **Request:** `{"url": "https://example.com"}`
/// **Response:** `{"title": "...", "summary": "..."}`
pub async fn generate_summary(
    State(state): State<AppState>,
    Json(payload): Json<SummaryRequest>,
) -> ApiResult<Json<BusinessSummary>> {
    match state.summary.summarize_site(&payload.url).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => Err(state.note_failure(e).await),
    }
}

pub fn organization_routes() -> Router<AppState> {
    Router::new()
        .route("/organizations", post(register).get(list))
        .route("/organizations/tools/generate-summary", post(generate_summary))
        .route(
            "/organizations/:id",
            get(get_organization).delete(delete_organization),
        )
        .route("/organizations/:id/content-calendar", get(get_organization_calendar))
}
