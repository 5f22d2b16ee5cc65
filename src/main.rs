//! λF Service: Binary Entrypoint
//! Boots the Axum HTTP server: config, credentials, topic defaults, the
//! shared history store, and the `/metrics` route.

use lambda_f_engine::{api, build_state, metrics::Metrics, AppConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs. The runtime may already have installed a
/// subscriber; in that case this is a no-op.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lambda_f_engine=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Missing/malformed config, credentials or topic defaults stop startup here.
    let cfg = AppConfig::load()?;
    let state = build_state(&cfg).await?;
    let metrics = Metrics::init()?;

    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
