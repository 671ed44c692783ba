//! In-process collaborator fakes
//!
//! Each fake records what it was asked for so tests can assert on the
//! calls as well as on the stored result.

use async_trait::async_trait;
use cadence_api::services::{
    BusinessSummary, FetchError, KeywordMetricsProvider, LlmError, MetricsError, PageFetcher,
    TextGenerator,
};
use cadence_api::Collaborators;
use cadence_common::db::{Competition, KeywordMetrics};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a fake collaborator should fail
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    Api,
    Timeout,
}

#[derive(Default)]
pub struct FakeTextGenerator {
    keywords: Vec<String>,
    /// None: numbered topics, exactly as many as requested
    topics: Option<Vec<String>>,
    keyword_failure: Option<Failure>,
    topic_failure: Option<Failure>,
    /// Latency added to every keyword and topic call
    delay: Option<Duration>,
    pub keyword_calls: AtomicUsize,
    pub topic_requests: Mutex<Vec<(Vec<String>, usize)>>,
    pub summary_inputs: Mutex<Vec<String>>,
}

impl FakeTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_topics(mut self, topics: &[&str]) -> Self {
        self.topics = Some(topics.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn failing_keywords(mut self, failure: Failure) -> Self {
        self.keyword_failure = Some(failure);
        self
    }

    pub fn failing_topics(mut self, failure: Failure) -> Self {
        self.topic_failure = Some(failure);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn respond_slowly(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn keyword_calls(&self) -> usize {
        self.keyword_calls.load(Ordering::SeqCst)
    }

    pub fn topic_requests(&self) -> Vec<(Vec<String>, usize)> {
        self.topic_requests.lock().unwrap().clone()
    }
}

fn llm_failure(failure: Failure) -> LlmError {
    match failure {
        Failure::Api => LlmError::Api(500, "upstream exploded".to_string()),
        Failure::Timeout => LlmError::Timeout,
    }
}

#[async_trait]
impl TextGenerator for FakeTextGenerator {
    async fn generate_keywords(&self, _description: &str) -> Result<Vec<String>, LlmError> {
        self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        self.respond_slowly().await;
        if let Some(failure) = self.keyword_failure {
            return Err(llm_failure(failure));
        }
        Ok(self.keywords.clone())
    }

    async fn generate_topics(
        &self,
        keywords: &[String],
        count: usize,
    ) -> Result<Vec<String>, LlmError> {
        self.topic_requests
            .lock()
            .unwrap()
            .push((keywords.to_vec(), count));
        self.respond_slowly().await;
        if let Some(failure) = self.topic_failure {
            return Err(llm_failure(failure));
        }
        Ok(match &self.topics {
            Some(topics) => topics.clone(),
            None => (1..=count).map(|i| format!("Topic {}", i)).collect(),
        })
    }

    async fn generate_summary(&self, page_text: &str) -> Result<BusinessSummary, LlmError> {
        self.summary_inputs.lock().unwrap().push(page_text.to_string());
        Ok(BusinessSummary {
            title: "Acme Widgets".to_string(),
            summary: "Acme sells widgets to small businesses.".to_string(),
        })
    }
}

#[derive(Default)]
pub struct FakeMetricsProvider {
    known: Vec<KeywordMetrics>,
    failure: Option<Failure>,
    pub requests: Mutex<Vec<Vec<String>>>,
}

impl FakeMetricsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `volume` searches for `keyword` whenever it is requested
    pub fn knowing(mut self, keyword: &str, volume: i64) -> Self {
        self.known.push(KeywordMetrics {
            keyword: keyword.to_string(),
            search_volume: Some(volume),
            cpc: Some(1.25),
            competition: Some(Competition::Medium),
            competition_index: Some(50),
            low_top_of_page_bid: Some(0.5),
            high_top_of_page_bid: Some(2.5),
        });
        self
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeywordMetricsProvider for FakeMetricsProvider {
    async fn get_metrics(&self, keywords: &[String]) -> Result<Vec<KeywordMetrics>, MetricsError> {
        self.requests.lock().unwrap().push(keywords.to_vec());
        match self.failure {
            Some(Failure::Api) => return Err(MetricsError::Task(40501, "Invalid login".to_string())),
            Some(Failure::Timeout) => return Err(MetricsError::Timeout),
            None => {}
        }
        Ok(self
            .known
            .iter()
            .filter(|m| keywords.contains(&m.keyword))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakePageFetcher {
    failure: Option<Failure>,
    pub urls: Mutex<Vec<String>>,
}

impl FakePageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }
}

#[async_trait]
impl PageFetcher for FakePageFetcher {
    async fn fetch_rendered_text(&self, url: &str) -> Result<String, FetchError> {
        self.urls.lock().unwrap().push(url.to_string());
        match self.failure {
            Some(Failure::Api) => Err(FetchError::Status(503)),
            Some(Failure::Timeout) => Err(FetchError::Timeout),
            None => Ok("Acme Widgets. Quality widgets since 1999.".to_string()),
        }
    }
}

/// Bundle fakes the way `Collaborators::from_config` bundles real clients
pub fn collaborators(
    text_generator: Arc<FakeTextGenerator>,
    metrics: Arc<FakeMetricsProvider>,
) -> Collaborators {
    Collaborators {
        text_generator,
        metrics,
        page_fetcher: Arc::new(FakePageFetcher::new()),
    }
}
