use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::collect::parse_date;
use crate::error::PipelineError;
use crate::pipeline::{CancelToken, IngestReport, LabelTrends, Pipeline, RescanReport, TopicSummary};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/topics/{topic}/summary", get(summary))
        .route("/api/topics/{topic}/count", get(count))
        .route("/api/topics/{topic}/sentiment", get(sentiment))
        .route("/api/topics/{topic}/damage", get(damage))
        .route("/api/topics/{topic}/trends", get(trends))
        .route("/api/ingest", post(ingest))
        .route("/api/rescan", post(rescan))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// JSON error body with a status code.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body {
            error: String,
        }
        (self.status, Json(Body { error: self.message })).into_response()
    }
}

async fn summary(State(state): State<AppState>, Path(topic): Path<String>) -> Json<TopicSummary> {
    Json(state.pipeline.aggregate(&topic).await)
}

#[derive(Serialize)]
struct CountOut {
    topic: String,
    total_count: u64,
}

async fn count(State(state): State<AppState>, Path(topic): Path<String>) -> Json<CountOut> {
    let total_count = state.pipeline.total_count(&topic).await;
    Json(CountOut { topic, total_count })
}

#[derive(Serialize)]
struct SentimentOut {
    topic: String,
    overall_sentiment: f64,
}

async fn sentiment(State(state): State<AppState>, Path(topic): Path<String>) -> Json<SentimentOut> {
    let overall_sentiment = state.pipeline.overall_sentiment(&topic).await;
    Json(SentimentOut {
        topic,
        overall_sentiment,
    })
}

async fn damage(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Json<BTreeMap<String, u64>> {
    Json(state.pipeline.damage_distribution(&topic).await)
}

async fn trends(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Json<LabelTrends> {
    Json(state.pipeline.sentiment_trends(&topic).await)
}

#[derive(Deserialize)]
struct IngestReq {
    topic: String,
    start: String,
    end: String,
    #[serde(default)]
    analyze: bool,
}

async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestReq>,
) -> Result<Json<IngestReport>, ApiError> {
    if req.topic.trim().is_empty() {
        return Err(ApiError::bad_request("topic must not be empty"));
    }
    let start = parse_date(&req.start).map_err(|e| ApiError::bad_request(format!("start: {e}")))?;
    let end = parse_date(&req.end).map_err(|e| ApiError::bad_request(format!("end: {e}")))?;
    if start > end {
        return Err(ApiError::bad_request("start must not be after end"));
    }

    let report = state
        .pipeline
        .ingest_cycle(&req.topic, start, end, req.analyze, &CancelToken::new())
        .await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct RescanReq {
    topic: String,
}

async fn rescan(
    State(state): State<AppState>,
    Json(req): Json<RescanReq>,
) -> Result<Json<RescanReport>, ApiError> {
    if req.topic.trim().is_empty() {
        return Err(ApiError::bad_request("topic must not be empty"));
    }
    let report = state
        .pipeline
        .rescan_cycle(&req.topic, &CancelToken::new())
        .await?;
    Ok(Json(report))
}
