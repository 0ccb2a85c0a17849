//! Disaster media pulse: HTTP entrypoint.
//! Boots the pipeline from `config/pipeline.toml` and serves the dashboard API.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    disaster_media_pulse::telemetry::init_tracing();

    let router = disaster_media_pulse::app().await?;
    Ok(router.into())
}
