// src/pipeline/mod.rs
//! # Pipeline orchestrator
//!
//! Owns the collector list and the labelled repository federation, and runs:
//! - the ingest cycle: collectors -> optional enrichment -> the write target,
//! - the rescan cycle: pending items of every repository -> enrichment -> update,
//! - federated aggregates (see [`aggregate`]).
//!
//! Per-item failures are logged, counted and reported; only configuration
//! problems (no repository, unknown write target) stop a cycle.

pub mod aggregate;

use chrono::NaiveDate;
use futures::future::join_all;
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::collect::Collector;
use crate::enrich::{EnrichOutcome, Enricher};
use crate::error::PipelineError;
use crate::repository::{Repository, SaveOutcome};

pub use aggregate::{LabelTrends, SentimentLabel, TopicSummary};

pub const DEFAULT_RESCAN_DELAY: Duration = Duration::from_millis(500);

/// Which repository receives ingest writes. Reads always span all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WriteTarget {
    /// The first repository registered.
    #[default]
    First,
    /// The repository registered under this label.
    Label(String),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub write_target: WriteTarget,
    /// Pause between consecutive enrichment calls during a rescan.
    pub rescan_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            write_target: WriteTarget::First,
            rescan_delay: DEFAULT_RESCAN_DELAY,
        }
    }
}

/// Cooperative cancellation, checked between items.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Short content hash of the item.
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub topic: String,
    pub write_target: String,
    pub collected: usize,
    pub enriched: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub collector_errors: usize,
    pub failures: Vec<ItemFailure>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RescanReport {
    pub topic: String,
    /// Items handed to the enricher.
    pub attempted: usize,
    /// Items written back.
    pub updated: usize,
    /// Written back and no longer pending.
    pub resolved: usize,
    pub skipped: usize,
    pub no_text: usize,
    pub failed: usize,
    pub repository_errors: usize,
    /// At least one repository had tried all its pending items and started over.
    pub restarted: bool,
    pub cancelled: bool,
}

impl RescanReport {
    /// No further cycle can make progress: nothing left to try, or a fresh pass
    /// over already-tried items resolved none of them.
    pub fn is_settled(&self) -> bool {
        self.attempted == 0 || (self.restarted && self.resolved == 0)
    }
}

pub struct Pipeline {
    collectors: Vec<Arc<dyn Collector>>,
    repositories: Vec<(String, Arc<dyn Repository>)>,
    enricher: Enricher,
    config: PipelineConfig,
    /// (repository label, topic) -> content keys tried since the last restart.
    rescan_attempted: Mutex<HashMap<(String, String), HashSet<String>>>,
}

impl Pipeline {
    pub fn new(enricher: Enricher, config: PipelineConfig) -> Self {
        Self {
            collectors: Vec::new(),
            repositories: Vec::new(),
            enricher,
            config,
            rescan_attempted: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_collector(&mut self, collector: Arc<dyn Collector>) {
        self.collectors.push(collector);
    }

    pub fn clear_collectors(&mut self) {
        self.collectors.clear();
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    /// Register `repo` under `label`. An existing label keeps its position and
    /// gets the new repository.
    pub fn add_repository(&mut self, label: impl Into<String>, repo: Arc<dyn Repository>) {
        let label = label.into();
        match self.repositories.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => {
                slot.1 = repo;
                self.rescan_attempted
                    .get_mut()
                    .retain(|(l, _), _| *l != label);
            }
            None => self.repositories.push((label, repo)),
        }
    }

    pub fn repository_labels(&self) -> Vec<&str> {
        self.repositories.iter().map(|(l, _)| l.as_str()).collect()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Startup check: at least one repository and a resolvable write target.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.writer().map(|_| ())
    }

    fn writer(&self) -> Result<(&str, &Arc<dyn Repository>), PipelineError> {
        if self.repositories.is_empty() {
            return Err(PipelineError::NoRepositories);
        }
        let found = match &self.config.write_target {
            WriteTarget::First => self.repositories.first(),
            WriteTarget::Label(label) => self.repositories.iter().find(|(l, _)| l == label),
        };
        match found {
            Some((label, repo)) => Ok((label.as_str(), repo)),
            None => match &self.config.write_target {
                WriteTarget::Label(label) => Err(PipelineError::UnknownWriteTarget(label.clone())),
                WriteTarget::First => Err(PipelineError::NoRepositories),
            },
        }
    }

    /// Pull candidates from every collector and store them in the write target.
    pub async fn ingest_cycle(
        &self,
        topic: &str,
        start: NaiveDate,
        end: NaiveDate,
        analyze_immediately: bool,
        cancel: &CancelToken,
    ) -> Result<IngestReport, PipelineError> {
        let (target_label, target) = self.writer()?;
        let mut report = IngestReport {
            topic: topic.to_string(),
            write_target: target_label.to_string(),
            ..Default::default()
        };

        tracing::info!(
            target: "ingest",
            topic, %start, %end, analyze_immediately,
            collectors = self.collectors.len(),
            write_target = target_label,
            "starting ingest cycle"
        );

        // Collectors are polled together; their batches are handled in registration order.
        let batches = join_all(
            self.collectors
                .iter()
                .map(|c| async move { (c.name().to_string(), c.collect(topic, start, end, 1).await) }),
        )
        .await;

        'collectors: for (collector, batch) in batches {
            let items = match batch {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(target: "ingest", %collector, error = %format!("{e:#}"), "collector failed, continuing");
                    counter!("ingest_collector_errors_total").increment(1);
                    report.collector_errors += 1;
                    continue;
                }
            };
            tracing::info!(target: "ingest", %collector, items = items.len(), "collector batch");

            for mut item in items {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'collectors;
                }
                report.collected += 1;
                counter!("ingest_items_total").increment(1);

                if analyze_immediately && self.enricher.enrich(&mut item).await.touched() {
                    report.enriched += 1;
                }

                match target.save(&item).await {
                    Ok(SaveOutcome::Inserted) => {
                        report.saved += 1;
                        counter!("ingest_saved_total").increment(1);
                    }
                    Ok(SaveOutcome::Duplicate) => {
                        report.duplicates += 1;
                        counter!("ingest_duplicates_total").increment(1);
                    }
                    Err(e) => {
                        let id = item.log_id();
                        let error = format!("{e:#}");
                        tracing::error!(target: "ingest", %id, repo = target_label, %error, "save failed");
                        counter!("ingest_save_errors_total").increment(1);
                        report.failed += 1;
                        report.failures.push(ItemFailure { id, error });
                    }
                }
            }
        }

        gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            target: "ingest",
            topic,
            collected = report.collected,
            saved = report.saved,
            duplicates = report.duplicates,
            failed = report.failed,
            collector_errors = report.collector_errors,
            cancelled = report.cancelled,
            "ingest cycle finished"
        );
        Ok(report)
    }

    /// Complete missing enrichment for one page of pending items per repository.
    ///
    /// Each repository keeps a per-topic set of items already tried, so pages move
    /// past items that stay pending after enrichment. Once every pending item has
    /// been tried the set is cleared and the next page starts from the oldest again
    /// (`RescanReport::restarted`).
    pub async fn rescan_cycle(
        &self,
        topic: &str,
        cancel: &CancelToken,
    ) -> Result<RescanReport, PipelineError> {
        if self.repositories.is_empty() {
            return Err(PipelineError::NoRepositories);
        }
        let mut report = RescanReport {
            topic: topic.to_string(),
            ..Default::default()
        };
        let mut calls_made = 0usize;

        for (label, repo) in &self.repositories {
            let key = (label.clone(), topic.to_string());
            let mut attempted = self
                .rescan_attempted
                .lock()
                .await
                .remove(&key)
                .unwrap_or_default();

            let mut page = repo.find_pending_excluding(topic, &attempted).await;
            if matches!(&page, Ok(items) if items.is_empty()) && !attempted.is_empty() {
                tracing::info!(target: "rescan", repo = %label, topic, tried = attempted.len(), "every pending item tried, starting over");
                attempted.clear();
                report.restarted = true;
                page = repo.find_pending_excluding(topic, &attempted).await;
            }

            let pending = match page {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(target: "rescan", repo = %label, error = %format!("{e:#}"), "find_pending failed, skipping repository");
                    report.repository_errors += 1;
                    self.rescan_attempted.lock().await.insert(key, attempted);
                    continue;
                }
            };
            tracing::info!(target: "rescan", repo = %label, topic, pending = pending.len(), "scanning for missing analysis");

            for mut item in pending {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                // The page may be stale by the time we get here.
                if !item.needs_analysis() {
                    report.skipped += 1;
                    continue;
                }

                if calls_made > 0 && !self.config.rescan_delay.is_zero() {
                    tokio::time::sleep(self.config.rescan_delay).await;
                }
                calls_made += 1;
                report.attempted += 1;
                attempted.insert(item.content_key());

                let id = item.log_id();
                match self.enricher.enrich(&mut item).await {
                    EnrichOutcome::Skipped => {
                        report.no_text += 1;
                        continue;
                    }
                    EnrichOutcome::Failed => {
                        tracing::warn!(target: "rescan", %id, repo = %label, "enrichment failed, leaving item pending");
                        report.failed += 1;
                        continue;
                    }
                    EnrichOutcome::Complete | EnrichOutcome::Partial => {}
                }

                match repo.update_analysis(&item).await {
                    Ok(true) => {
                        report.updated += 1;
                        if !item.needs_analysis() {
                            report.resolved += 1;
                        }
                        counter!("rescan_updated_total").increment(1);
                    }
                    Ok(false) => {
                        tracing::warn!(target: "rescan", %id, repo = %label, "no stored record matched the item content");
                        report.failed += 1;
                    }
                    Err(e) => {
                        tracing::error!(target: "rescan", %id, repo = %label, error = %format!("{e:#}"), "update failed");
                        counter!("rescan_update_errors_total").increment(1);
                        report.failed += 1;
                    }
                }
            }

            self.rescan_attempted.lock().await.insert(key, attempted);
            if report.cancelled {
                break;
            }
        }

        tracing::info!(
            target: "rescan",
            topic,
            updated = report.updated,
            resolved = report.resolved,
            restarted = report.restarted,
            skipped = report.skipped,
            no_text = report.no_text,
            failed = report.failed,
            cancelled = report.cancelled,
            "rescan finished"
        );
        Ok(report)
    }
}
