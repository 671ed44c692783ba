//! Keyword discovery
//!
//! Turns a business description into stored keyword records: candidates come
//! from the text generator, unseen ones are enriched by the metrics provider
//! and persisted. Keywords already in the store are returned as they are,
//! without another metrics lookup.

use cadence_common::db::{Keyword, KeywordMetrics};
use cadence_common::{Error, Result};
use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{upstream_failure, KeywordMetricsProvider, TextGenerator};
use crate::db::keywords;

const OPERATION: &str = "keyword discovery";

/// Canonical keyword text: trimmed, lowercased, inner whitespace collapsed
pub fn normalize_keyword(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize, drop empties and de-duplicate keeping the first occurrence
fn normalize_candidates(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|k| normalize_keyword(k))
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

#[derive(Clone)]
pub struct KeywordDiscovery {
    text_generator: Arc<dyn TextGenerator>,
    metrics: Arc<dyn KeywordMetricsProvider>,
}

impl KeywordDiscovery {
    pub fn new(
        text_generator: Arc<dyn TextGenerator>,
        metrics: Arc<dyn KeywordMetricsProvider>,
    ) -> Self {
        Self {
            text_generator,
            metrics,
        }
    }

    /// Discover keywords for a business description.
    ///
    /// Returns the already-stored matches (store order) followed by the
    /// newly enriched ones (candidate order). Candidates the metrics
    /// provider has no data for are not stored.
    pub async fn discover_keywords(
        &self,
        conn: &mut SqliteConnection,
        description: &str,
    ) -> Result<Vec<Keyword>> {
        if description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Business description must not be empty".to_string(),
            ));
        }

        let raw = self
            .text_generator
            .generate_keywords(description)
            .await
            .map_err(|e| upstream_failure(OPERATION, &e))?;

        let candidates = normalize_candidates(&raw);
        if candidates.is_empty() {
            tracing::warn!(generated = raw.len(), "Text generator produced no usable keywords");
            return Ok(Vec::new());
        }

        let mut result = keywords::find_by_texts(conn, &candidates).await?;
        let known: HashSet<String> = result.iter().map(|k| k.keyword.to_lowercase()).collect();
        let unseen: Vec<String> = candidates
            .into_iter()
            .filter(|c| !known.contains(c))
            .collect();

        tracing::debug!(
            existing = result.len(),
            unseen = unseen.len(),
            "Partitioned keyword candidates"
        );

        if unseen.is_empty() {
            return Ok(result);
        }

        let metrics = self
            .metrics
            .get_metrics(&unseen)
            .await
            .map_err(|e| upstream_failure(OPERATION, &e))?;

        let enriched = match_requested(&unseen, metrics);
        if enriched.len() < unseen.len() {
            tracing::info!(
                requested = unseen.len(),
                enriched = enriched.len(),
                "Metrics provider returned data for fewer keywords than requested"
            );
        }
        if enriched.is_empty() {
            return Ok(result);
        }

        let inserted = keywords::insert_enriched(conn, &enriched).await?;
        let texts: Vec<String> = enriched.into_iter().map(|m| m.keyword).collect();

        // Re-read so rows a concurrent discovery inserted first are returned too
        let mut stored: HashMap<String, Keyword> = keywords::find_by_texts(conn, &texts)
            .await?
            .into_iter()
            .map(|k| (k.keyword.clone(), k))
            .collect();
        result.extend(texts.iter().filter_map(|t| stored.remove(t)));

        tracing::info!(inserted, total = result.len(), "Keyword discovery complete");
        Ok(result)
    }
}

/// Metrics for the requested texts only, one per text, in request order
fn match_requested(requested: &[String], metrics: Vec<KeywordMetrics>) -> Vec<KeywordMetrics> {
    let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
    let mut by_text: HashMap<String, KeywordMetrics> = HashMap::new();

    for m in metrics {
        let text = normalize_keyword(&m.keyword);
        if wanted.contains(text.as_str()) && !by_text.contains_key(&text) {
            by_text.insert(text.clone(), KeywordMetrics { keyword: text, ..m });
        }
    }

    requested.iter().filter_map(|t| by_text.remove(t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keyword() {
        assert_eq!(normalize_keyword("  Machine   Learning\t"), "machine learning");
        assert_eq!(normalize_keyword("SOFTWARE "), "software");
        assert_eq!(normalize_keyword("   "), "");
    }

    #[test]
    fn test_candidates_dedup_keeps_first_occurrence() {
        let raw: Vec<String> = ["Software", "seo", "software", "", "SOFTWARE ", "SEO tools"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(normalize_candidates(&raw), vec!["software", "seo", "seo tools"]);
    }

    #[test]
    fn test_match_requested_ignores_unrequested_and_duplicates() {
        let requested = vec!["nodejs".to_string(), "deno".to_string()];
        let metrics = vec![
            KeywordMetrics {
                keyword: "unrelated".to_string(),
                ..Default::default()
            },
            KeywordMetrics {
                keyword: "NodeJS".to_string(),
                search_volume: Some(1),
                ..Default::default()
            },
            KeywordMetrics {
                keyword: "nodejs".to_string(),
                search_volume: Some(2),
                ..Default::default()
            },
        ];

        let matched = match_requested(&requested, metrics);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].keyword, "nodejs");
        assert_eq!(matched[0].search_volume, Some(1));
    }
}
