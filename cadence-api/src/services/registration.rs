//! Organization registration flow
//!
//! Keyword discovery and topic generation run first. The organization, its
//! calendar, its keyword links and the first window of content are then
//! written in one transaction. If any step fails no organization is kept;
//! keywords stored by discovery stay, like any other discovery call.

use cadence_common::db::{ContentCalendar, Organization};
use cadence_common::{time, Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{ContentScheduler, KeywordDiscovery};
use crate::db::content_items::{self, NewContentItem};
use crate::db::organizations::{self, NewOrganization};
use crate::db::{calendar_keywords, calendars, keywords};
use crate::utils::{retry_on_lock, TransactionScope};

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    /// Website, with or without scheme
    pub domain: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Business description keywords are discovered from
    pub description: String,
    /// Stored keywords to link in addition to the discovered ones
    #[serde(default)]
    pub keyword_ids: Vec<Uuid>,
}

/// Slug and display name derived from a domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedDomain {
    pub slug: String,
    pub name: String,
}

/// `https://my-shop.com` becomes slug `my-shop`, name `my shop`.
///
/// The scheme is stripped, then everything from the last `.` on.
pub fn sanitize_domain(domain: &str) -> Result<SanitizedDomain> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Domain must not be empty".to_string()));
    }

    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let slug = match without_scheme.rfind('.') {
        Some(dot) => &without_scheme[..dot],
        None => without_scheme,
    };

    if slug.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Domain '{}' does not yield an organization slug",
            domain
        )));
    }

    Ok(SanitizedDomain {
        slug: slug.to_string(),
        name: slug.replace('-', " "),
    })
}

#[derive(Clone)]
pub struct RegistrationService {
    db: SqlitePool,
    discovery: KeywordDiscovery,
    scheduler: ContentScheduler,
    max_lock_wait_ms: u64,
}

/// What the write transaction produced
struct Registered {
    organization: Organization,
    calendar: ContentCalendar,
    linked: u64,
    items: usize,
}

impl RegistrationService {
    pub fn new(
        db: SqlitePool,
        discovery: KeywordDiscovery,
        scheduler: ContentScheduler,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            db,
            discovery,
            scheduler,
            max_lock_wait_ms,
        }
    }

    /// Register an organization on behalf of `user_id`, returning its id
    pub async fn register(&self, request: &RegistrationRequest, user_id: &str) -> Result<Uuid> {
        let sanitized = sanitize_domain(&request.domain)?;
        if request.description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Business description must not be empty".to_string(),
            ));
        }

        let (keyword_ids, keyword_texts) = {
            let mut conn = self.db.acquire().await?;

            if organizations::find_by_slug(&mut conn, &sanitized.slug)
                .await?
                .is_some()
            {
                return Err(Error::Conflict(format!(
                    "Organization with slug '{}' already exists",
                    sanitized.slug
                )));
            }

            let discovered = self
                .discovery
                .discover_keywords(&mut conn, &request.description)
                .await?;

            let mut keyword_ids: Vec<Uuid> = Vec::new();
            let mut keyword_texts: Vec<String> = Vec::new();
            for keyword in discovered {
                if !keyword_ids.contains(&keyword.id) {
                    keyword_ids.push(keyword.id);
                    keyword_texts.push(keyword.keyword);
                }
            }
            for id in &request.keyword_ids {
                if keyword_ids.contains(id) {
                    continue;
                }
                let keyword = keywords::find_by_id(&mut conn, *id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("Keyword {}", id)))?;
                keyword_ids.push(keyword.id);
                keyword_texts.push(keyword.keyword);
            }

            (keyword_ids, keyword_texts)
        };

        // The new calendar is empty, so the whole window is planned
        let items = match self.scheduler.policy().plan(time::now(), &[]) {
            Some(plan) => self.scheduler.generate_items(&keyword_texts, &plan).await?,
            None => Vec::new(),
        };

        let new_organization = NewOrganization {
            name: sanitized.name,
            slug: sanitized.slug,
            domain: request.domain.trim().to_string(),
            title: request.title.clone(),
            description: Some(request.description.clone()),
            created_by: user_id.to_string(),
        };

        let registered = retry_on_lock("register organization", self.max_lock_wait_ms, || {
            self.write_registration(&new_organization, &keyword_ids, &items)
        })
        .await?;

        tracing::info!(
            organization_id = %registered.organization.id,
            slug = %registered.organization.slug,
            calendar_id = %registered.calendar.id,
            keywords = registered.linked,
            items = registered.items,
            "Organization registered"
        );

        Ok(registered.organization.id)
    }

    async fn write_registration(
        &self,
        new_organization: &NewOrganization,
        keyword_ids: &[Uuid],
        items: &[NewContentItem],
    ) -> Result<Registered> {
        let mut scope = TransactionScope::begin(&self.db, "registration::register").await?;

        let organization = organizations::create(scope.conn()?, new_organization).await?;
        let calendar = calendars::create_default(scope.conn()?, organization.id).await?;
        let linked = calendar_keywords::add_keywords(scope.conn()?, calendar.id, keyword_ids).await?;
        let created = content_items::insert_batch(scope.conn()?, calendar.id, items).await?;

        scope.commit().await?;

        Ok(Registered {
            organization,
            calendar,
            linked,
            items: created.len(),
        })
    }
}
