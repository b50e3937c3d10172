//! HTTP API
//!
//! Thin axum surface over the shared store: prediction, stats, history,
//! a manual poll trigger, and a guarded reset. No prediction logic
//! lives here.

use crate::ingester::{self, RoundSource};
use crate::predictor::Ensemble;
use crate::storage::{SharedStore, StoreStats};
use crate::types::{ComponentProbs, Observation, Outcome};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state for all handlers.
pub struct AppState {
    pub store: SharedStore,
    pub ensemble: Ensemble,
    pub source: Arc<dyn RoundSource>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", get(predict))
        .route("/stats", get(stats))
        .route("/history", get(history))
        .route("/poll", get(poll))
        .route("/reset", post(reset))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: msg.into(),
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    /// Session id of the latest settled round.
    pub session: u64,
    pub dice: [u8; 3],
    pub total: u8,
    pub result: Outcome,
    pub next_session: u64,
    pub predict: Outcome,
    pub confidence: f64,
    pub explain: String,
    pub labels: Vec<String>,
    /// Trailing slice of the compact pattern string.
    pub pattern: String,
    pub components: ComponentProbs,
}

async fn predict(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut store = state.store.write();
    let Some(latest) = store.latest().cloned() else {
        return Err(error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no data available yet, waiting for poll",
        ));
    };

    let result = store.predict_next(&state.ensemble);
    let pattern = store.pattern();
    let tail = &pattern[pattern.len().saturating_sub(20)..];

    Ok(Json(PredictResponse {
        session: latest.session,
        dice: latest.dice,
        total: latest.total,
        result: latest.outcome,
        next_session: latest.session + 1,
        predict: result.prediction,
        confidence: result.confidence,
        explain: result.explain,
        labels: result.labels,
        pattern: tail.to_string(),
        components: result.components,
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<StoreStats> {
    Json(state.store.read().stats())
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub history: Vec<Observation>,
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    let limit = params.limit.unwrap_or(100).min(500);
    let history = state.store.read().recent(limit);
    Json(HistoryResponse {
        count: history.len(),
        history,
    })
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub session: u64,
    pub new_round: bool,
}

async fn poll(State(state): State<Arc<AppState>>) -> Result<Json<PollResponse>, ApiError> {
    match ingester::poll_once(state.source.as_ref(), &state.store).await {
        Ok(report) => Ok(Json(PollResponse {
            session: report.session,
            new_round: report.accepted,
        })),
        Err(e) => Err(error(StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub ok: bool,
}

async fn reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    if !req.confirm {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "to reset, send { \"confirm\": true }",
        ));
    }
    state
        .store
        .write()
        .reset()
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    tracing::warn!("store reset via API");
    Ok(Json(ResetResponse { ok: true }))
}
