// src/lib.rs
// Public library surface for the server, the ingest CLI and integration tests.

pub mod api;
pub mod bootstrap;
pub mod collect;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod media;
pub mod metrics;
pub mod pipeline;
pub mod repository;
pub mod telemetry;

pub use crate::api::router;
pub use crate::error::PipelineError;
pub use crate::media::{DamageCategory, MediaItem, MediaKind};
pub use crate::pipeline::{CancelToken, Pipeline, PipelineConfig, WriteTarget};

use axum::Router;
use once_cell::sync::OnceCell;

use crate::config::pipeline::PipelineSettings;
use crate::metrics::Metrics;

static METRICS: OnceCell<Metrics> = OnceCell::new();

/// Process-wide Prometheus recorder, installed on first use.
pub fn metrics() -> anyhow::Result<&'static Metrics> {
    METRICS.get_or_try_init(Metrics::init)
}

/// Full HTTP app: pipeline routes from the configured settings plus `/metrics`.
pub async fn app() -> anyhow::Result<Router> {
    let settings = PipelineSettings::load_default()?;
    let pipeline = bootstrap::build_pipeline(&settings).await?;
    let mut router = api::router(api::AppState::new(pipeline));

    match metrics() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "metrics disabled"),
    }
    Ok(router)
}
