// src/repository/mod.rs
//! Repository contract and the aggregation rules every store must follow.
//!
//! Identity is the exact `content` string: `save` ignores an item whose content
//! is already stored, `update_analysis` targets the first stored record with
//! that content.

pub mod file;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::media::{MediaItem, SENTIMENT_UNSET};

pub use file::FileRepository;
pub use memory::InMemoryRepository;

/// Upper bound on items returned by one `find_pending` call.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Per-date sentiment keyed by item type label (`"news"`, `"social_post"`).
pub type TypeTrends = BTreeMap<String, BTreeMap<NaiveDate, f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Inserted,
    Duplicate,
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Idempotent insert keyed on exact content.
    async fn save(&self, item: &MediaItem) -> Result<SaveOutcome>;

    /// Overwrite `sentiment` and `damage_type` of the record with the same content.
    /// Returns whether a record matched.
    async fn update_analysis(&self, item: &MediaItem) -> Result<bool>;

    /// Up to one page of items for `topic` that still need analysis.
    async fn find_pending(&self, topic: &str) -> Result<Vec<MediaItem>>;

    /// Up to one page of pending items whose `content_key` is not in `attempted`.
    /// Stores that cannot filter natively only drop those keys from their first page.
    async fn find_pending_excluding(
        &self,
        topic: &str,
        attempted: &HashSet<String>,
    ) -> Result<Vec<MediaItem>> {
        let page = self.find_pending(topic).await?;
        Ok(page
            .into_iter()
            .filter(|it| !attempted.contains(&it.content_key()))
            .collect())
    }

    async fn count_by_topic(&self, topic: &str) -> Result<u64>;

    /// Mean over analyzed items only (sentiment != 0.0); 0.0 when there are none.
    async fn average_sentiment(&self, topic: &str) -> Result<f64>;

    /// Display name -> count, `Unknown` excluded.
    async fn damage_distribution(&self, topic: &str) -> Result<BTreeMap<String, u64>>;

    /// Type label -> date -> pairwise running average of analyzed sentiment.
    async fn daily_sentiment_trends(&self, topic: &str) -> Result<TypeTrends>;
}

// ------------------------------------------------------------
// Aggregation rules shared by the stores
// ------------------------------------------------------------

pub fn average_analyzed_sentiment<'a>(items: impl IntoIterator<Item = &'a MediaItem>) -> f64 {
    let (sum, n) = items
        .into_iter()
        .filter(|it| it.sentiment != SENTIMENT_UNSET)
        .fold((0.0f64, 0usize), |(s, n), it| (s + it.sentiment, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

pub fn damage_histogram<'a>(
    items: impl IntoIterator<Item = &'a MediaItem>,
) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for it in items {
        if it.damage_type.is_unknown() {
            continue;
        }
        *out.entry(it.damage_type.display_name().to_string())
            .or_insert(0) += 1;
    }
    out
}

/// Fold `value` into the stored per-date value: first observation is kept as is,
/// each later one replaces the stored value with `(stored + value) / 2`.
pub fn fold_running_average(slot: &mut BTreeMap<NaiveDate, f64>, date: NaiveDate, value: f64) {
    slot.entry(date)
        .and_modify(|avg| *avg = (*avg + value) / 2.0)
        .or_insert(value);
}

/// Items are folded in iteration order; unanalyzed sentiment is skipped.
pub fn daily_trends<'a>(items: impl IntoIterator<Item = &'a MediaItem>) -> TypeTrends {
    let mut out = TypeTrends::new();
    for it in items {
        if it.sentiment == SENTIMENT_UNSET {
            continue;
        }
        let per_type = out.entry(it.type_label().to_string()).or_default();
        fold_running_average(per_type, it.timestamp.date_naive(), it.sentiment);
    }
    out
}
