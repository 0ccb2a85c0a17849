// src/enrich/mod.rs
//! Enrichment: sentiment score + damage category for one item.
//!
//! Text selection order: inline content, then the fetched article body when the
//! item carries an HTTP(S) link. No text means the item is left untouched.
//! Scorer and classifier are called independently; one failing never blocks
//! the other.

pub mod hosted;
pub mod keywords;
pub mod lexicon;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;

use crate::fetch::ContentFetch;
use crate::media::{DamageCategory, MediaItem};

pub use keywords::KeywordDamageClassifier;
pub use lexicon::LexiconSentimentScorer;

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score_sentiment(&self, text: &str) -> Result<f64>;
}

#[async_trait]
pub trait DamageClassifier: Send + Sync {
    async fn classify_damage(&self, text: &str) -> Result<DamageCategory>;
}

/// What happened to one item during enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichOutcome {
    /// No usable text; sentinels untouched.
    Skipped,
    /// Both calls succeeded.
    Complete,
    /// Exactly one call succeeded.
    Partial,
    /// Both calls failed.
    Failed,
}

impl EnrichOutcome {
    fn from_results(sentiment_ok: bool, damage_ok: bool) -> Self {
        match (sentiment_ok, damage_ok) {
            (true, true) => EnrichOutcome::Complete,
            (false, false) => EnrichOutcome::Failed,
            _ => EnrichOutcome::Partial,
        }
    }

    /// Whether anything on the item may have changed.
    pub fn touched(self) -> bool {
        matches!(self, EnrichOutcome::Complete | EnrichOutcome::Partial)
    }
}

#[derive(Clone)]
pub struct Enricher {
    scorer: Arc<dyn SentimentScorer>,
    classifier: Arc<dyn DamageClassifier>,
    fetcher: Arc<dyn ContentFetch>,
}

impl Enricher {
    pub fn new(
        scorer: Arc<dyn SentimentScorer>,
        classifier: Arc<dyn DamageClassifier>,
        fetcher: Arc<dyn ContentFetch>,
    ) -> Self {
        Self {
            scorer,
            classifier,
            fetcher,
        }
    }

    /// Text to analyze, or `None` when neither content nor the linked page has any.
    pub async fn text_for(&self, item: &MediaItem) -> Option<String> {
        if item.has_content() {
            return Some(item.content.clone());
        }
        if let Some(url) = item.url.as_deref().filter(|_| item.has_valid_url()) {
            let body = self.fetcher.fetch_text(url).await;
            if !body.trim().is_empty() {
                return Some(body);
            }
        }
        None
    }

    pub async fn enrich(&self, item: &mut MediaItem) -> EnrichOutcome {
        let id = item.log_id();
        let Some(text) = self.text_for(item).await else {
            tracing::info!(target: "enrich", %id, "no usable text, skipping enrichment");
            counter!("enrich_skipped_total").increment(1);
            return EnrichOutcome::Skipped;
        };

        let sentiment_ok = match self.scorer.score_sentiment(&text).await {
            Ok(score) => {
                item.sentiment = score;
                true
            }
            Err(e) => {
                tracing::warn!(target: "enrich", %id, error = %format!("{e:#}"), "sentiment scoring failed");
                counter!("enrich_failures_total", "dimension" => "sentiment").increment(1);
                false
            }
        };

        let damage_ok = match self.classifier.classify_damage(&text).await {
            Ok(category) => {
                item.damage_type = category;
                true
            }
            Err(e) => {
                tracing::warn!(target: "enrich", %id, error = %format!("{e:#}"), "damage classification failed");
                counter!("enrich_failures_total", "dimension" => "damage").increment(1);
                false
            }
        };

        EnrichOutcome::from_results(sentiment_ok, damage_ok)
    }
}
