//! Scores a topic file once and prints the result as JSON.
//!
//! Usage: `score_once [TOPICS.json] [--save | --simulate]`
//! Without a path the configured default topics are used. `--save` appends
//! to the scores collection, `--simulate` to the simulations collection.
//! Saving needs the file backend; the memory store would vanish on exit.

use anyhow::{bail, Result};
use lambda_f_engine::{build_store, compute_score, topics, AppConfig, HistoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut path = None;
    let mut persist = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--save" => persist = Some(false),
            "--simulate" => persist = Some(true),
            flag if flag.starts_with("--") => bail!("unknown flag: {flag}"),
            p => path = Some(p.to_string()),
        }
    }

    let cfg = AppConfig::load()?;
    let set = match path {
        Some(p) => topics::load_default_topics(p)?,
        None => topics::load_default_topics(&cfg.default_topics_source)?,
    };

    let result = compute_score(&set);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(is_simulated) = persist {
        cfg.require_durable_store()?;
        let credentials = cfg.load_credentials()?;
        let store = build_store(&cfg, credentials.as_ref()).await?;
        let record = store.append(&result, is_simulated).await?;
        eprintln!("saved {} to {}", record.id, record.collection);
    }
    Ok(())
}
