//! cadence-api library interface
//!
//! Exposes the router, state and services for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use cadence_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::{
    BusinessSummaryService, CalendarLocks, ContentScheduler, DataForSeoClient, HttpPageFetcher,
    KeywordDiscovery, KeywordMetricsProvider, OpenAiClient, PageFetcher, RegistrationService,
    SchedulingPolicy, TextGenerator,
};

/// External systems the services call through
#[derive(Clone)]
pub struct Collaborators {
    pub text_generator: Arc<dyn TextGenerator>,
    pub metrics: Arc<dyn KeywordMetricsProvider>,
    pub page_fetcher: Arc<dyn PageFetcher>,
}

impl Collaborators {
    /// Production clients built from a validated configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let missing = |what: &str| Error::Config(format!("{} not configured", what));

        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| missing("OpenAI API key"))?;
        let login = config
            .dataforseo_login
            .clone()
            .ok_or_else(|| missing("DataForSEO login"))?;
        let password = config
            .dataforseo_password
            .clone()
            .ok_or_else(|| missing("DataForSEO password"))?;

        let text_generator = OpenAiClient::new(&config.toml.openai, api_key)
            .map_err(|e| Error::Config(format!("OpenAI client: {}", e)))?;
        let metrics = DataForSeoClient::new(&config.toml.dataforseo, login, password)
            .map_err(|e| Error::Config(format!("DataForSEO client: {}", e)))?;
        let page_fetcher = HttpPageFetcher::new(&config.toml.page_fetch)
            .map_err(|e| Error::Config(format!("Page fetcher: {}", e)))?;

        Ok(Self {
            text_generator: Arc::new(text_generator),
            metrics: Arc::new(metrics),
            page_fetcher: Arc::new(page_fetcher),
        })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub discovery: KeywordDiscovery,
    pub scheduler: ContentScheduler,
    pub registration: RegistrationService,
    pub summary: BusinessSummaryService,
    /// Serializes top-ups per calendar
    pub calendar_locks: CalendarLocks,
    /// Retry budget for writes that hit `database is locked`
    pub max_lock_wait_ms: u64,
    pub startup_time: DateTime<Utc>,
    /// Last upstream or internal failure, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        collaborators: Collaborators,
        policy: SchedulingPolicy,
        max_lock_wait_ms: u64,
    ) -> Self {
        let discovery = KeywordDiscovery::new(
            collaborators.text_generator.clone(),
            collaborators.metrics.clone(),
        );
        let scheduler = ContentScheduler::new(collaborators.text_generator.clone(), policy);
        let registration = RegistrationService::new(
            db.clone(),
            discovery.clone(),
            scheduler.clone(),
            max_lock_wait_ms,
        );
        let summary = BusinessSummaryService::new(
            collaborators.page_fetcher.clone(),
            collaborators.text_generator.clone(),
        );

        Self {
            db,
            discovery,
            scheduler,
            registration,
            summary,
            calendar_locks: CalendarLocks::new(),
            max_lock_wait_ms,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Pooled connection for a handler
    pub async fn conn(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.db.acquire().await?)
    }

    /// Remember server-side failures for /health, then hand the error back
    pub async fn note_failure(&self, err: Error) -> ApiError {
        if !matches!(
            err,
            Error::NotFound(_) | Error::InvalidInput(_) | Error::Conflict(_)
        ) {
            *self.last_error.write().await = Some(err.to_string());
        }
        ApiError::from(err)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::organization_routes())
        .merge(api::calendar_routes())
        .merge(api::content_item_routes())
        .merge(api::keyword_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
