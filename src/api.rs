use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::MAX_HISTORY_LIMIT;
use crate::history::{
    self, ensure_metrics_described, Collection, HistoryRecord, HistoryStore, Order, SharedStore,
    StoreError, TrendPoint,
};
use crate::scoring::{compute_score, ObservationError, ObservationSet, ScoreResult, TopicInput};

/// Shared per-process state. The store handle is created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub defaults: Arc<ObservationSet>,
    /// Overrides `Collection::default_limit` when set.
    pub history_limit: Option<usize>,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        defaults: ObservationSet,
        history_limit: Option<usize>,
    ) -> Self {
        Self {
            store,
            defaults: Arc::new(defaults),
            history_limit,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/topics", get(topics))
        .route("/score", post(score))
        .route("/scores", post(save_score))
        .route("/simulations", post(save_simulation))
        .route("/history/{collection}", get(history_recent))
        .route("/history/{collection}/trend", get(history_trend))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Invalid(#[from] ObservationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorOut {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(StoreError::WriteRejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(StoreError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (
            status,
            Json(ErrorOut {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

async fn topics(State(state): State<AppState>) -> Json<Vec<TopicInput>> {
    Json(state.defaults.to_inputs())
}

fn score_inputs(items: Vec<TopicInput>) -> Result<ScoreResult, ApiError> {
    let set = ObservationSet::from_inputs(items)?;
    let result = compute_score(&set);

    ensure_metrics_described();
    counter!("lambda_f_scores_total").increment(1);
    gauge!("lambda_f_last").set(result.lambda_f());
    tracing::debug!(
        topics = set.len(),
        lambda_f = result.lambda_f(),
        tier = %result.tier(),
        "score computed"
    );
    Ok(result)
}

async fn score(Json(items): Json<Vec<TopicInput>>) -> Result<Json<ScoreResult>, ApiError> {
    Ok(Json(score_inputs(items)?))
}

async fn save(
    state: &AppState,
    items: Vec<TopicInput>,
    is_simulated: bool,
) -> Result<(StatusCode, Json<HistoryRecord>), ApiError> {
    let result = score_inputs(items)?;
    let record = state.store.append(&result, is_simulated).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn save_score(
    State(state): State<AppState>,
    Json(items): Json<Vec<TopicInput>>,
) -> Result<(StatusCode, Json<HistoryRecord>), ApiError> {
    save(&state, items, false).await
}

async fn save_simulation(
    State(state): State<AppState>,
    Json(items): Json<Vec<TopicInput>>,
) -> Result<(StatusCode, Json<HistoryRecord>), ApiError> {
    save(&state, items, true).await
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    order: Option<Order>,
}

#[derive(Serialize)]
struct HistoryOut {
    collection: Collection,
    /// `false` when the store could not be read; `records` is then empty.
    available: bool,
    records: Vec<HistoryRecord>,
}

fn parse_collection(raw: &str) -> Result<Collection, ApiError> {
    raw.parse().map_err(ApiError::NotFound)
}

fn effective_limit(state: &AppState, collection: Collection, q: &HistoryQuery) -> usize {
    q.limit
        .or(state.history_limit)
        .unwrap_or_else(|| collection.default_limit())
        .min(MAX_HISTORY_LIMIT)
}

async fn history_recent(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryOut>, ApiError> {
    let collection = parse_collection(&collection)?;
    let limit = effective_limit(&state, collection, &q);
    let (records, available) = history::recent_or_empty(
        state.store.as_ref(),
        collection,
        limit,
        q.order.unwrap_or_default(),
    )
    .await;
    Ok(Json(HistoryOut {
        collection,
        available,
        records,
    }))
}

async fn history_trend(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let collection = parse_collection(&collection)?;
    let limit = effective_limit(&state, collection, &q);
    // Most recent `limit` records, then re-ordered ascending for charting.
    let (records, _) =
        history::recent_or_empty(state.store.as_ref(), collection, limit, Order::Desc).await;
    Ok(Json(history::trend(&records)))
}
