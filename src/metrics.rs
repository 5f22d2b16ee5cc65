//! Prometheus exposition for the score and history counters.
//!
//! The series themselves are emitted where the work happens (`api`,
//! `history`); this module only owns the recorder and the `/metrics` route.

use anyhow::Context;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::history::ensure_metrics_described;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide recorder and describe the λF series up front,
    /// so `/metrics` lists them before the first score or append. Call once.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        tracing::debug!("prometheus recorder installed");
        Ok(Self { handle })
    }

    /// `GET /metrics` in the Prometheus text format.
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
