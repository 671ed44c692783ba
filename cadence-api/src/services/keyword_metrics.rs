//! Keyword metrics collaborator
//!
//! `KeywordMetricsProvider` attaches search volume, CPC and competition data
//! to keyword phrases. `DataForSeoClient` implements it with the Google Ads
//! search volume endpoint.

use async_trait::async_trait;
use cadence_common::config::DataForSeoConfig;
use cadence_common::db::{Competition, KeywordMetrics};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use super::UpstreamError;

const SEARCH_VOLUME_PATH: &str = "/v3/keywords_data/google_ads/search_volume/live";
const TASK_OK: i64 = 20000;
const SORT_BY: &str = "relevance";
/// Outbound requests per second
const RATE_LIMIT_PER_SECOND: u32 = 5;

/// Keyword metrics errors
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("No keywords to enrich")]
    EmptyRequest,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Task error {0}: {1}")]
    Task(i64, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for MetricsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MetricsError::Timeout
        } else {
            MetricsError::Network(err.to_string())
        }
    }
}

impl UpstreamError for MetricsError {
    fn is_timeout(&self) -> bool {
        matches!(self, MetricsError::Timeout)
    }
}

#[async_trait]
pub trait KeywordMetricsProvider: Send + Sync {
    /// Metrics for as many of `keywords` as the provider knows.
    ///
    /// The result may be shorter than the input and is not guaranteed to be
    /// in input order.
    async fn get_metrics(&self, keywords: &[String]) -> Result<Vec<KeywordMetrics>, MetricsError>;
}

#[derive(Debug, Serialize)]
struct SearchVolumeTask<'a> {
    keywords: &'a [String],
    sort_by: &'a str,
    location_code: u32,
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchVolumeResponse {
    #[serde(default)]
    tasks: Vec<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    status_code: i64,
    #[serde(default)]
    status_message: String,
    #[serde(default)]
    result: Option<Vec<KeywordData>>,
}

#[derive(Debug, Deserialize)]
struct KeywordData {
    keyword: String,
    search_volume: Option<i64>,
    cpc: Option<f64>,
    competition: Option<String>,
    competition_index: Option<i64>,
    low_top_of_page_bid: Option<f64>,
    high_top_of_page_bid: Option<f64>,
}

impl From<KeywordData> for KeywordMetrics {
    fn from(data: KeywordData) -> Self {
        KeywordMetrics {
            keyword: data.keyword,
            search_volume: data.search_volume,
            cpc: data.cpc,
            competition: data
                .competition
                .as_deref()
                .and_then(|c| c.parse::<Competition>().ok()),
            competition_index: data.competition_index,
            low_top_of_page_bid: data.low_top_of_page_bid,
            high_top_of_page_bid: data.high_top_of_page_bid,
        }
    }
}

/// DataForSEO client (HTTP Basic auth)
pub struct DataForSeoClient {
    http_client: reqwest::Client,
    base_url: String,
    login: String,
    password: String,
    location_code: u32,
    language_code: String,
    rate_limiter: DefaultDirectRateLimiter,
}

impl DataForSeoClient {
    pub fn new(config: &DataForSeoConfig, login: String, password: String) -> Result<Self, MetricsError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MetricsError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(RATE_LIMIT_PER_SECOND).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            login,
            password,
            location_code: config.location_code,
            language_code: config.language_code.clone(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl KeywordMetricsProvider for DataForSeoClient {
    async fn get_metrics(&self, keywords: &[String]) -> Result<Vec<KeywordMetrics>, MetricsError> {
        if keywords.is_empty() {
            return Err(MetricsError::EmptyRequest);
        }

        self.rate_limiter.until_ready().await;

        let tasks = [SearchVolumeTask {
            keywords,
            sort_by: SORT_BY,
            location_code: self.location_code,
            language_code: &self.language_code,
        }];

        tracing::debug!(keywords = keywords.len(), "Querying DataForSEO search volume");

        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, SEARCH_VOLUME_PATH))
            .basic_auth(&self.login, Some(&self.password))
            .json(&tasks)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MetricsError::Api(status.as_u16(), error_text));
        }

        let body: SearchVolumeResponse = response
            .json()
            .await
            .map_err(|e| MetricsError::Parse(e.to_string()))?;

        let task = body
            .tasks
            .into_iter()
            .next()
            .ok_or_else(|| MetricsError::Parse("response contains no task".to_string()))?;

        if task.status_code != TASK_OK {
            return Err(MetricsError::Task(task.status_code, task.status_message));
        }

        let metrics: Vec<KeywordMetrics> = task
            .result
            .unwrap_or_default()
            .into_iter()
            .map(KeywordMetrics::from)
            .collect();

        tracing::info!(
            requested = keywords.len(),
            returned = metrics.len(),
            "DataForSEO lookup successful"
        );

        Ok(metrics)
    }
}
