// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the pipeline series.
    /// Fails when a recorder is already installed in this process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("ingest_items_total", "Candidate items handled by ingest cycles");
    describe_counter!("ingest_saved_total", "Items newly stored by ingest cycles");
    describe_counter!("ingest_duplicates_total", "Items ignored because their content was already stored");
    describe_counter!("ingest_save_errors_total", "Items whose save failed");
    describe_counter!("ingest_collector_errors_total", "Collector calls that failed");
    describe_gauge!("ingest_last_run_ts", "Unix time of the last finished ingest cycle");
    describe_counter!("enrich_skipped_total", "Items with no usable text to analyze");
    describe_counter!("enrich_failures_total", "Failed analyzer calls, by dimension");
    describe_counter!("rescan_updated_total", "Stored items updated by rescans");
    describe_counter!("rescan_update_errors_total", "Rescan updates that failed");
    describe_counter!("aggregate_query_errors_total", "Repository queries dropped from an aggregate");
    describe_counter!("collect_items_total", "Items parsed from collector feeds");
    describe_histogram!("collect_parse_ms", "Feed parse time in milliseconds");
    describe_counter!("hosted_calls_total", "Uncached calls made to the hosted engine");
    describe_counter!("hosted_cache_hits_total", "Hosted engine answers served from the file cache");
}
