//! Text generation collaborator
//!
//! `TextGenerator` is the seam the discovery, scheduling and summary
//! services call through. `OpenAiClient` implements it against an
//! OpenAI-compatible chat completions endpoint in JSON mode.

use async_trait::async_trait;
use cadence_common::config::OpenAiConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use super::UpstreamError;

const KEYWORDS_PER_DESCRIPTION: usize = 15;

/// Text generation errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl UpstreamError for LlmError {
    fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Timeout)
    }
}

/// Title and short description of a business, derived from its website
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSummary {
    pub title: String,
    pub summary: String,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// SEO keyword phrases relevant to a business description
    async fn generate_keywords(&self, description: &str) -> Result<Vec<String>, LlmError>;

    /// Up to `count` blog post titles built around `keywords`
    async fn generate_topics(&self, keywords: &[String], count: usize)
        -> Result<Vec<String>, LlmError>;

    /// Summarize extracted website text
    async fn generate_summary(&self, page_text: &str) -> Result<BusinessSummary, LlmError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeywordList {
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TopicList {
    topics: Vec<String>,
}

/// OpenAI chat completions client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, api_key: String) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Send a system + user prompt and decode the JSON reply as `T`
    async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<T, LlmError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(status.as_u16(), error_text));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("completion has no content".to_string()))?;

        serde_json::from_str(&content).map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate_keywords(&self, description: &str) -> Result<Vec<String>, LlmError> {
        let system = format!(
            "You are an expert SEO strategist with deep knowledge of keyword research and \
             searcher intent. Read the business description and generate a list of {} highly \
             relevant, multi-word (2-5 words each) SEO keyword phrases. \
             Respond with JSON: {{\"keywords\": [\"keyword1\", \"keyword2\"]}}",
            KEYWORDS_PER_DESCRIPTION
        );

        let list: KeywordList = self.complete_json(&system, description).await?;
        tracing::debug!(keywords = list.keywords.len(), "Generated keyword candidates");
        Ok(list.keywords)
    }

    async fn generate_topics(
        &self,
        keywords: &[String],
        count: usize,
    ) -> Result<Vec<String>, LlmError> {
        let system = format!(
            "You are an expert SEO strategist and content marketing specialist. Read the list of \
             SEO keywords and generate {} relevant blog post topics, each a compelling headline. \
             Respond with JSON: {{\"topics\": [\"headline1\", \"headline2\"]}}",
            count
        );

        let list: TopicList = self.complete_json(&system, &keywords.join(", ")).await?;
        tracing::debug!(requested = count, topics = list.topics.len(), "Generated topics");
        Ok(list.topics)
    }

    async fn generate_summary(&self, page_text: &str) -> Result<BusinessSummary, LlmError> {
        let system = "You are a marketing expert. You are given website content; summarize the \
                      business it describes in 3-4 sentences and give the website a short, \
                      precise title. Respond with JSON: {\"title\": \"title\", \"summary\": \"summary\"}";
        let user = format!("Please summarize the following website content: {}", page_text);

        self.complete_json(system, &user).await
    }
}
