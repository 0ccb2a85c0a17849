// src/bootstrap.rs
//! Wires settings into a ready [`Pipeline`]: stores, collectors, enrichment backend.
//! Shared by the server and the `ingest` CLI.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::collect::rss::RssCollector;
use crate::config::ai::{AiConfig, DEFAULT_AI_CONFIG_PATH};
use crate::config::pipeline::{EnrichmentBackend, PipelineSettings};
use crate::enrich::hosted::build_engine;
use crate::enrich::{
    DamageClassifier, Enricher, KeywordDamageClassifier, LexiconSentimentScorer, SentimentScorer,
};
use crate::fetch::ContentFetcher;
use crate::pipeline::Pipeline;
use crate::repository::FileRepository;

/// Scorer and classifier for the configured backend.
pub fn build_enricher(settings: &PipelineSettings) -> Result<Enricher> {
    let fetcher = Arc::new(ContentFetcher::new(settings.fetch_timeout())?);

    let (scorer, classifier): (Arc<dyn SentimentScorer>, Arc<dyn DamageClassifier>) =
        match settings.enrichment.backend {
            EnrichmentBackend::Local => {
                let classifier = match &settings.enrichment.keywords_path {
                    Some(p) => KeywordDamageClassifier::load_from_file(p)?,
                    None => KeywordDamageClassifier::default(),
                };
                info!(backend = "local", rules = classifier.rules.len(), "enrichment ready");
                (Arc::new(LexiconSentimentScorer::new()), Arc::new(classifier))
            }
            EnrichmentBackend::Hosted => {
                let cfg = AiConfig::load_from_file(DEFAULT_AI_CONFIG_PATH)
                    .with_context(|| format!("loading {DEFAULT_AI_CONFIG_PATH}"))?;
                // Diagnostics only: never the key itself.
                info!(
                    backend = "hosted",
                    provider = %cfg.provider,
                    enabled = cfg.enabled,
                    key_len = cfg.api_key.len(),
                    daily_limit = cfg.daily_limit,
                    "enrichment config loaded"
                );
                let engine = build_engine(&cfg)?;
                info!(provider = engine.provider_name(), "enrichment ready");
                (engine.clone(), engine)
            }
        };

    Ok(Enricher::new(scorer, classifier, fetcher))
}

/// Open every configured store (fatal on failure), register the RSS collector
/// when enabled, and check the write target.
pub async fn build_pipeline(settings: &PipelineSettings) -> Result<Pipeline> {
    let enricher = build_enricher(settings)?;
    let mut pipeline = Pipeline::new(enricher, settings.pipeline_config());

    for repo in &settings.repositories {
        let store = FileRepository::open(&repo.path)
            .await?
            .with_page_size(settings.page_size());
        pipeline.add_repository(repo.label.clone(), Arc::new(store));
    }

    if settings.collector.enabled {
        let rss = RssCollector::from_endpoint(&settings.collector.endpoint, settings.fetch_timeout())?;
        pipeline.register_collector(Arc::new(rss));
    } else {
        warn!("rss collector disabled; ingest cycles will collect nothing");
    }

    pipeline.validate()?;
    info!(
        repositories = ?pipeline.repository_labels(),
        collectors = pipeline.collector_count(),
        page_size = settings.page_size(),
        rescan_delay_ms = settings.rescan_delay_ms,
        "pipeline ready"
    );
    Ok(pipeline)
}
