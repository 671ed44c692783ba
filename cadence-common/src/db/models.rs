//! Database models
//!
//! Relationships are held as foreign keys only. A calendar's items and
//! keywords are resolved by query, never stored on the calendar itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Tenant root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub domain: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One calendar per organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCalendar {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Blog,
    SocialPost,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Blog => "blog",
            ContentType::SocialPost => "social_post",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blog" => Ok(ContentType::Blog),
            "social_post" => Ok(ContentType::SocialPost),
            other => Err(Error::InvalidInput(format!("Unknown content type: {}", other))),
        }
    }
}

/// A scheduled piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub content_calendar_id: Uuid,
    pub content_type: ContentType,
    pub title: String,
    /// None until content is written
    pub body: Option<String>,
    pub publish_date: DateTime<Utc>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Advertiser competition bucket reported by the metrics provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Competition {
    Low,
    Medium,
    High,
}

impl Competition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Competition::Low => "LOW",
            Competition::Medium => "MEDIUM",
            Competition::High => "HIGH",
        }
    }
}

impl fmt::Display for Competition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Competition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Competition::Low),
            "MEDIUM" => Ok(Competition::Medium),
            "HIGH" => Ok(Competition::High),
            other => Err(Error::InvalidInput(format!("Unknown competition level: {}", other))),
        }
    }
}

/// Search metrics attached to a keyword phrase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordMetrics {
    pub keyword: String,
    pub search_volume: Option<i64>,
    pub cpc: Option<f64>,
    pub competition: Option<Competition>,
    pub competition_index: Option<i64>,
    pub low_top_of_page_bid: Option<f64>,
    pub high_top_of_page_bid: Option<f64>,
}

/// Global keyword record, unique by normalized text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: Uuid,
    pub keyword: String,
    pub search_volume: Option<i64>,
    pub cpc: Option<f64>,
    pub competition: Option<Competition>,
    pub competition_index: Option<i64>,
    pub low_top_of_page_bid: Option<f64>,
    pub high_top_of_page_bid: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Join record between a calendar and a keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarKeyword {
    pub content_calendar_id: Uuid,
    pub keyword_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
