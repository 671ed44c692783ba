//! Content scheduler
//!
//! Keeps a calendar's rolling window filled. A top-up only runs when at
//! least `min_batch` slots are missing; new items start the day after the
//! latest item already in the window (or today, for an empty window) and
//! take one day each.

use cadence_common::config::SchedulingConfig;
use cadence_common::db::{ContentItem, ContentType};
use cadence_common::{time, Error, Result};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{upstream_failure, TextGenerator};
use crate::db::content_items::{self, NewContentItem};
use crate::db::{calendar_keywords, calendars};

const OPERATION: &str = "content topic generation";

/// Window length and minimum batch size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingPolicy {
    pub window_days: u32,
    pub min_batch: u32,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self::from(&SchedulingConfig::default())
    }
}

impl From<&SchedulingConfig> for SchedulingPolicy {
    fn from(config: &SchedulingConfig) -> Self {
        Self {
            window_days: config.window_days,
            min_batch: config.min_batch,
        }
    }
}

/// What a top-up would create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopUpPlan {
    /// 00:00 UTC of the current day
    pub window_start: DateTime<Utc>,
    /// Publish date of the first new item
    pub anchor: DateTime<Utc>,
    pub count: usize,
}

impl SchedulingPolicy {
    /// Decide whether the window needs a top-up.
    ///
    /// `window` holds the items already inside
    /// `[start_of_day(now), start_of_day(now) + window_days)`.
    pub fn plan(&self, now: DateTime<Utc>, window: &[ContentItem]) -> Option<TopUpPlan> {
        let window_start = time::start_of_day(now);
        let missing = (self.window_days as usize).saturating_sub(window.len());
        if missing == 0 || missing < self.min_batch as usize {
            return None;
        }

        let anchor = window
            .iter()
            .map(|item| item.publish_date)
            .max()
            .map(|latest| time::add_days(latest, 1))
            .unwrap_or(window_start);

        Some(TopUpPlan {
            window_start,
            anchor,
            count: missing,
        })
    }
}

#[derive(Clone)]
pub struct ContentScheduler {
    text_generator: Arc<dyn TextGenerator>,
    policy: SchedulingPolicy,
}

impl ContentScheduler {
    pub fn new(text_generator: Arc<dyn TextGenerator>, policy: SchedulingPolicy) -> Self {
        Self {
            text_generator,
            policy,
        }
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Top up a calendar's window as of now
    pub async fn top_up_calendar(
        &self,
        conn: &mut SqliteConnection,
        calendar_id: Uuid,
    ) -> Result<Vec<ContentItem>> {
        self.top_up_calendar_at(conn, calendar_id, time::now()).await
    }

    /// Top up a calendar's window as of `now`.
    ///
    /// Returns the created items, or nothing when the window is full enough.
    /// The items are inserted all-or-nothing.
    pub async fn top_up_calendar_at(
        &self,
        conn: &mut SqliteConnection,
        calendar_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContentItem>> {
        match self.prepare_top_up(conn, calendar_id, now).await? {
            Some(pending) => pending.insert(conn).await,
            None => Ok(Vec::new()),
        }
    }

    /// Plan a top-up and generate its items without writing anything.
    ///
    /// Only reads go through `conn`, so no write lock is held while the
    /// text generator runs.
    pub async fn prepare_top_up(
        &self,
        conn: &mut SqliteConnection,
        calendar_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingTopUp>> {
        if calendars::find_by_id(conn, calendar_id).await?.is_none() {
            return Err(Error::NotFound(format!("Content calendar {}", calendar_id)));
        }

        let window = calendars::find_items_in_window(
            conn,
            calendar_id,
            time::start_of_day(now),
            self.policy.window_days,
        )
        .await?;

        let Some(plan) = self.policy.plan(now, &window) else {
            tracing::debug!(
                calendar_id = %calendar_id,
                existing = window.len(),
                "Calendar window does not need a top-up"
            );
            return Ok(None);
        };

        let keywords: Vec<String> = calendar_keywords::keywords_for_calendar(conn, calendar_id)
            .await?
            .into_iter()
            .map(|k| k.keyword)
            .collect();

        let items = self.generate_items(&keywords, &plan).await?;

        Ok(Some(PendingTopUp {
            calendar_id,
            existing: window.len(),
            anchor: plan.anchor,
            items,
        }))
    }

    /// Ask the text generator for `plan.count` topics and lay them out one
    /// per day from the anchor. Extra topics are dropped.
    pub async fn generate_items(
        &self,
        keywords: &[String],
        plan: &TopUpPlan,
    ) -> Result<Vec<NewContentItem>> {
        let mut topics: Vec<String> = self
            .text_generator
            .generate_topics(keywords, plan.count)
            .await
            .map_err(|e| upstream_failure(OPERATION, &e))?
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        topics.truncate(plan.count);

        if topics.len() < plan.count {
            tracing::warn!(
                requested = plan.count,
                received = topics.len(),
                "Text generator returned fewer topics than requested"
            );
        }

        Ok(topics
            .into_iter()
            .enumerate()
            .map(|(i, title)| NewContentItem {
                content_type: ContentType::Blog,
                title,
                body: Some(String::new()),
                publish_date: time::add_days(plan.anchor, i as i64),
                is_published: false,
            })
            .collect())
    }
}

/// Items generated for a calendar, not yet stored
#[derive(Debug, Clone)]
pub struct PendingTopUp {
    pub calendar_id: Uuid,
    /// Items already in the window when the top-up was planned
    pub existing: usize,
    pub anchor: DateTime<Utc>,
    pub items: Vec<NewContentItem>,
}

impl PendingTopUp {
    /// Store the items all-or-nothing
    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<Vec<ContentItem>> {
        let created = content_items::insert_batch(conn, self.calendar_id, &self.items).await?;

        tracing::info!(
            calendar_id = %self.calendar_id,
            existing = self.existing,
            items = created.len(),
            anchor = %self.anchor,
            "Calendar topped up"
        );

        Ok(created)
    }
}

/// Per-calendar async mutexes serializing top-ups within this process
#[derive(Clone, Default)]
pub struct CalendarLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl CalendarLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a calendar. Released when the guard drops.
    pub async fn acquire(&self, calendar_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries only the registry references are idle
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(calendar_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of calendars with a held or awaited lock
    pub async fn active(&self) -> usize {
        let locks = self.locks.lock().await;
        locks.values().filter(|l| Arc::strong_count(l) > 1).count()
    }
}
