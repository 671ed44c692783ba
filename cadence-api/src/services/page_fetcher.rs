//! Page fetch collaborator
//!
//! Retrieves a web page and reduces it to the visible text a summarizer
//! can work with. Scripts are not executed: client-rendered pages yield
//! only their server-rendered text.

use async_trait::async_trait;
use cadence_common::config::PageFetchConfig;
use scraper::Html;
use std::time::Duration;
use thiserror::Error;

use super::UpstreamError;

/// Elements whose contents are never visible text
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

/// Page fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() || err.is_body() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl UpstreamError for FetchError {
    fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Visible text of the page at `url`, whitespace-collapsed and truncated
    async fn fetch_rendered_text(&self, url: &str) -> Result<String, FetchError>;
}

/// reqwest + scraper page fetcher
pub struct HttpPageFetcher {
    http_client: reqwest::Client,
    max_text_chars: usize,
}

impl HttpPageFetcher {
    pub fn new(config: &PageFetchConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            max_text_chars: config.max_text_chars,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_rendered_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        let text = extract_text(&html, self.max_text_chars);
        if text.is_empty() {
            return Err(FetchError::Parse("page has no visible text".to_string()));
        }

        tracing::debug!(url, chars = text.chars().count(), "Fetched page text");
        Ok(text)
    }
}

/// Visible text of an HTML document.
///
/// Drops `script`/`style`/`noscript` contents, collapses whitespace, and cuts
/// the result at `max_chars` characters followed by `...`.
pub fn extract_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }

    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_chars {
        let mut truncated: String = collapsed.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    } else {
        collapsed
    }
}
