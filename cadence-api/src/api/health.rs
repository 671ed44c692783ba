//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the database is unreachable
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Calendars currently being topped up
    pub active_top_ups: usize,
    /// Last upstream or internal failure, for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let db_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" }.to_string(),
        module: "cadence-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        active_top_ups: state.calendar_locks.active().await,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
