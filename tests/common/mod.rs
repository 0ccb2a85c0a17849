// tests/common/mod.rs
// Deterministic stand-ins for collectors, analyzers, fetchers and stores.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use disaster_media_pulse::collect::Collector;
use disaster_media_pulse::enrich::{DamageClassifier, Enricher, SentimentScorer};
use disaster_media_pulse::fetch::ContentFetch;
use disaster_media_pulse::media::{DamageCategory, MediaItem};
use disaster_media_pulse::pipeline::{Pipeline, PipelineConfig, WriteTarget};
use disaster_media_pulse::repository::{Repository, SaveOutcome, TypeTrends};

pub const TOPIC: &str = "Typhoon Yagi";

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
}

pub fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, d, h, 0, 0).unwrap()
}

pub fn news(content: &str) -> MediaItem {
    MediaItem::news(TOPIC, content, None, at(7, 12), "Test Wire")
}

pub fn analyzed(content: &str, sentiment: f64, damage: DamageCategory) -> MediaItem {
    let mut it = news(content);
    it.sentiment = sentiment;
    it.damage_type = damage;
    it
}

// ---- collectors ----

pub struct FixedCollector(pub Vec<MediaItem>);

#[async_trait]
impl Collector for FixedCollector {
    async fn collect(&self, _: &str, _: NaiveDate, _: NaiveDate, page: u32) -> Result<Vec<MediaItem>> {
        Ok(if page > 1 { Vec::new() } else { self.0.clone() })
    }
    fn name(&self) -> &str {
        "fixed"
    }
}

pub struct FailingCollector;

#[async_trait]
impl Collector for FailingCollector {
    async fn collect(&self, _: &str, _: NaiveDate, _: NaiveDate, _: u32) -> Result<Vec<MediaItem>> {
        Err(anyhow!("upstream unavailable"))
    }
    fn name(&self) -> &str {
        "failing"
    }
}

// ---- analyzers ----

pub struct FixedScorer {
    pub score: f64,
    pub calls: AtomicUsize,
}

impl FixedScorer {
    pub fn new(score: f64) -> Arc<Self> {
        Arc::new(Self {
            score,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SentimentScorer for FixedScorer {
    async fn score_sentiment(&self, _text: &str) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.score)
    }
}

pub struct FailingScorer;

#[async_trait]
impl SentimentScorer for FailingScorer {
    async fn score_sentiment(&self, _text: &str) -> Result<f64> {
        Err(anyhow!("scorer down"))
    }
}

pub struct FixedClassifier(pub DamageCategory);

#[async_trait]
impl DamageClassifier for FixedClassifier {
    async fn classify_damage(&self, _text: &str) -> Result<DamageCategory> {
        Ok(self.0)
    }
}

pub struct FailingClassifier;

#[async_trait]
impl DamageClassifier for FailingClassifier {
    async fn classify_damage(&self, _text: &str) -> Result<DamageCategory> {
        Err(anyhow!("classifier down"))
    }
}

/// Serves `body` for every URL and records what was asked.
pub struct StubFetch {
    pub body: String,
    pub asked: parking_lot::Mutex<Vec<String>>,
}

impl StubFetch {
    pub fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_string(),
            asked: parking_lot::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ContentFetch for StubFetch {
    async fn fetch_text(&self, url: &str) -> String {
        self.asked.lock().push(url.to_string());
        self.body.clone()
    }
}

pub fn enricher(
    scorer: Arc<dyn SentimentScorer>,
    classifier: Arc<dyn DamageClassifier>,
) -> Enricher {
    Enricher::new(scorer, classifier, StubFetch::new(""))
}

pub fn fixed_enricher(score: f64, damage: DamageCategory) -> Enricher {
    enricher(FixedScorer::new(score), Arc::new(FixedClassifier(damage)))
}

pub fn pipeline_with(enricher: Enricher, write_target: WriteTarget) -> Pipeline {
    Pipeline::new(
        enricher,
        PipelineConfig {
            write_target,
            rescan_delay: Duration::ZERO,
        },
    )
}

// ---- stores ----

/// Store whose every call fails.
pub struct BrokenRepository;

#[async_trait]
impl Repository for BrokenRepository {
    async fn save(&self, _: &MediaItem) -> Result<SaveOutcome> {
        Err(anyhow!("disk full"))
    }
    async fn update_analysis(&self, _: &MediaItem) -> Result<bool> {
        Err(anyhow!("disk full"))
    }
    async fn find_pending(&self, _: &str) -> Result<Vec<MediaItem>> {
        Err(anyhow!("store offline"))
    }
    async fn count_by_topic(&self, _: &str) -> Result<u64> {
        Err(anyhow!("store offline"))
    }
    async fn average_sentiment(&self, _: &str) -> Result<f64> {
        Err(anyhow!("store offline"))
    }
    async fn damage_distribution(&self, _: &str) -> Result<BTreeMap<String, u64>> {
        Err(anyhow!("store offline"))
    }
    async fn daily_sentiment_trends(&self, _: &str) -> Result<TypeTrends> {
        Err(anyhow!("store offline"))
    }
}
