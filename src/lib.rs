// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod history;
pub mod metrics;
pub mod scoring;
pub mod topics;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::history::{
    Collection, FileStore, HistoryRecord, HistoryStore, MemoryStore, Order, SharedStore,
    StoreError,
};
pub use crate::scoring::{compute_score, Observation, ObservationSet, ScoreResult, Tier};

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::{StoreBackend, StoreCredentials};

/// Create the process-wide store handle. Called once at startup; the handle
/// is then passed explicitly to every component.
pub async fn build_store(
    cfg: &AppConfig,
    credentials: Option<&StoreCredentials>,
) -> anyhow::Result<SharedStore> {
    let store: SharedStore = match cfg.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => {
            let dir = match credentials {
                Some(c) => cfg.store.data_dir.join(&c.project_id),
                None => cfg.store.data_dir.clone(),
            };
            Arc::new(
                FileStore::open(&dir)
                    .await
                    .with_context(|| format!("opening history store at {}", dir.display()))?,
            )
        }
    };
    info!(
        backend = store.name(),
        project = credentials.map(|c| c.project_id.as_str()),
        "history store ready"
    );
    Ok(store)
}

/// Everything that must succeed before serving: credentials, topic
/// defaults, store. Any failure is fatal.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let credentials = cfg.load_credentials()?;
    let defaults = topics::load_default_topics(&cfg.default_topics_source)?;
    let store = build_store(cfg, credentials.as_ref()).await?;
    Ok(AppState::new(store, defaults, cfg.history_limit))
}

/// Resolve configuration from the environment and build the full router.
pub async fn app() -> anyhow::Result<axum::Router> {
    let cfg = AppConfig::load()?;
    let state = build_state(&cfg).await?;
    Ok(router(state))
}
