//! Business summary from a website

use cadence_common::{Error, Result};
use reqwest::Url;
use std::sync::Arc;

use super::{upstream_failure, BusinessSummary, PageFetcher, TextGenerator};

const OPERATION: &str = "business summary";

#[derive(Clone)]
pub struct BusinessSummaryService {
    fetcher: Arc<dyn PageFetcher>,
    text_generator: Arc<dyn TextGenerator>,
}

impl BusinessSummaryService {
    pub fn new(fetcher: Arc<dyn PageFetcher>, text_generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            fetcher,
            text_generator,
        }
    }

    /// Fetch the page at `url` and summarize the business behind it
    pub async fn summarize_site(&self, url: &str) -> Result<BusinessSummary> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| Error::InvalidInput(format!("Invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidInput(format!(
                "Unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let text = self
            .fetcher
            .fetch_rendered_text(parsed.as_str())
            .await
            .map_err(|e| upstream_failure(OPERATION, &e))?;

        let summary = self
            .text_generator
            .generate_summary(&text)
            .await
            .map_err(|e| upstream_failure(OPERATION, &e))?;

        tracing::info!(url = %parsed, title = %summary.title, "Generated business summary");
        Ok(summary)
    }
}
