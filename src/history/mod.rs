//! # History Store
//! Append-only log of scored results, queryable by recency.
//!
//! Records live in one of two collections (raw scores vs. simulated saves).
//! A record is built and validated once, stamped by the store, and never
//! mutated afterwards. Backends implement [`HistoryStore`]; the handle is
//! created once per process and shared as [`SharedStore`].

pub mod file;
pub mod memory;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::scoring::{ScoreResult, Tier};

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("history store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("history write rejected: {0}")]
    WriteRejected(String),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::StoreUnavailable(_) => "unavailable",
            StoreError::WriteRejected(_) => "rejected",
        }
    }
}

/// Logical store partition, one per result category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    /// Raw computed scores.
    #[serde(rename = "lambdaF")]
    Scores,
    /// Scores saved from a simulation session.
    #[serde(rename = "lambda_f_simulation")]
    Simulations,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Scores, Collection::Simulations];

    pub fn for_source(is_simulated: bool) -> Self {
        if is_simulated {
            Collection::Simulations
        } else {
            Collection::Scores
        }
    }

    /// Records shown when a query gives no limit and none is configured:
    /// a longer trend window for raw scores than for simulation history.
    pub fn default_limit(&self) -> usize {
        match self {
            Collection::Scores => 30,
            Collection::Simulations => 10,
        }
    }

    /// Name as persisted.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Scores => "lambdaF",
            Collection::Simulations => "lambda_f_simulation",
        }
    }
}

impl FromStr for Collection {
    type Err = String;

    /// Accepts the persisted name or a short alias (`scores`, `simulations`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lambdaF" | "scores" => Ok(Collection::Scores),
            "lambda_f_simulation" | "simulations" => Ok(Collection::Simulations),
            other => Err(format!("unknown collection '{other}'")),
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Timestamp order for `list_recent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[serde(alias = "ascending")]
    Asc,
    #[default]
    #[serde(alias = "descending")]
    Desc,
}

/// Per-topic input snapshot stored alongside a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceDetail {
    pub sentiment: f64,
    pub volume: u64,
}

/// A persisted, immutable scored result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub collection: Collection,
    /// Store-assigned.
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "lambda_F")]
    pub lambda_f: f64,
    pub average_sentiment: f64,
    #[serde(rename = "status")]
    pub tier: Tier,
    #[serde(rename = "is_mock_data")]
    pub is_simulated: bool,
    pub source_details: BTreeMap<String, SourceDetail>,
}

impl HistoryRecord {
    /// Validate `result` and stamp it. Non-finite numbers and a λF outside
    /// [0,1] are rejected; nothing is written for a rejected record.
    pub fn build(
        result: &ScoreResult,
        is_simulated: bool,
        id: String,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let avg = result.average_sentiment();
        let lambda_f = result.lambda_f();
        if !avg.is_finite() {
            return Err(StoreError::WriteRejected(format!(
                "average_sentiment is not finite ({avg})"
            )));
        }
        if !lambda_f.is_finite() || !(0.0..=1.0).contains(&lambda_f) {
            return Err(StoreError::WriteRejected(format!(
                "lambda_F must be within [0,1], got {lambda_f}"
            )));
        }

        let source_details = result
            .observations()
            .iter()
            .map(|o| {
                (
                    o.topic.clone(),
                    SourceDetail {
                        sentiment: o.sentiment,
                        volume: o.volume,
                    },
                )
            })
            .collect();

        Ok(Self {
            id,
            collection: Collection::for_source(is_simulated),
            timestamp,
            lambda_f,
            average_sentiment: avg,
            tier: result.tier(),
            is_simulated,
            source_details,
        })
    }
}

/// Read-only point for trend rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub lambda_f: f64,
}

#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append `result` to the collection chosen by `is_simulated`.
    /// No retry on failure.
    async fn append(
        &self,
        result: &ScoreResult,
        is_simulated: bool,
    ) -> Result<HistoryRecord, StoreError>;

    /// Up to `limit` records ordered by timestamp.
    async fn list_recent(
        &self,
        collection: Collection,
        limit: usize,
        order: Order,
    ) -> Result<Vec<HistoryRecord>, StoreError>;

    fn name(&self) -> &'static str;
}

pub type SharedStore = Arc<dyn HistoryStore>;

/// Read helper: an unreachable store degrades to "no history".
/// Returns `(records, available)`.
pub async fn recent_or_empty(
    store: &dyn HistoryStore,
    collection: Collection,
    limit: usize,
    order: Order,
) -> (Vec<HistoryRecord>, bool) {
    match store.list_recent(collection, limit, order).await {
        Ok(records) => (records, true),
        Err(e) => {
            ensure_metrics_described();
            counter!("history_read_degraded_total").increment(1);
            tracing::warn!(store = store.name(), %collection, "history read degraded: {e}");
            (Vec::new(), false)
        }
    }
}

/// Project records into an ascending `(timestamp, λF)` series.
pub fn trend(records: &[HistoryRecord]) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = records
        .iter()
        .map(|r| TrendPoint {
            timestamp: r.timestamp,
            lambda_f: r.lambda_f,
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

/// Order by timestamp (ties keep insertion order ascending) and cut to `limit`.
/// Expects `records` in insertion order.
pub(crate) fn select_recent(
    mut records: Vec<HistoryRecord>,
    limit: usize,
    order: Order,
) -> Vec<HistoryRecord> {
    records.sort_by_key(|r| r.timestamp);
    if order == Order::Desc {
        records.reverse();
    }
    records.truncate(limit);
    records
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("history_appends_total", "Records appended, by collection.");
        describe_counter!(
            "history_append_errors_total",
            "Failed appends, by error kind."
        );
        describe_counter!(
            "history_read_degraded_total",
            "Reads that degraded to empty history."
        );
        describe_counter!("lambda_f_scores_total", "Score computations served.");
        describe_gauge!("lambda_f_last", "Most recently computed λF.");
    });
}

pub(crate) fn record_append_outcome(
    store: &'static str,
    res: &Result<HistoryRecord, StoreError>,
) {
    ensure_metrics_described();
    match res {
        Ok(rec) => {
            counter!("history_appends_total", "collection" => rec.collection.name())
                .increment(1);
            tracing::info!(
                store,
                collection = %rec.collection,
                id = %rec.id,
                lambda_f = rec.lambda_f,
                tier = %rec.tier,
                "history record appended"
            );
        }
        Err(e) => {
            counter!("history_append_errors_total", "kind" => e.kind()).increment(1);
            tracing::warn!(store, "history append failed: {e}");
        }
    }
}
