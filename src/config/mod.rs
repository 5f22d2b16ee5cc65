// src/config/mod.rs
//! Explicit startup configuration, passed to whatever needs it.
//!
//! Resolution order for the file: `$LAMBDA_F_CONFIG_PATH`, then
//! `config/lambda_f.toml`, then built-in defaults. Env vars override file
//! values. Soft values (history limit) are sanitized instead of failing.

pub mod credentials;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

pub use credentials::StoreCredentials;

pub const ENV_CONFIG_PATH: &str = "LAMBDA_F_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/lambda_f.toml";

const ENV_STORE_CREDENTIALS: &str = "LAMBDA_F_STORE_CREDENTIALS";
const ENV_DEFAULT_TOPICS: &str = "LAMBDA_F_DEFAULT_TOPICS";
const ENV_HISTORY_LIMIT: &str = "LAMBDA_F_HISTORY_LIMIT";
const ENV_STORE_BACKEND: &str = "LAMBDA_F_STORE_BACKEND";
const ENV_DATA_DIR: &str = "LAMBDA_F_DATA_DIR";

pub const MAX_HISTORY_LIMIT: usize = 1000;

fn default_topics_source() -> PathBuf {
    PathBuf::from("config/default_topics.json")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "file" | "jsonl" => Ok(StoreBackend::File),
            other => Err(anyhow!("unsupported store backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to a service-account style credentials JSON.
    #[serde(default)]
    pub store_credentials: Option<PathBuf>,
    #[serde(default = "default_topics_source")]
    pub default_topics_source: PathBuf,
    /// Records returned by history queries that give no limit. Unset (or 0)
    /// falls back to each collection's own window, see `Collection::default_limit`.
    #[serde(default)]
    pub history_limit: Option<usize>,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_credentials: None,
            default_topics_source: default_topics_source(),
            history_limit: None,
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML file, then apply env overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        cfg.finish()
    }

    /// Resolve using env var + fallbacks:
    /// 1) $LAMBDA_F_CONFIG_PATH (must exist)
    /// 2) config/lambda_f.toml
    /// 3) defaults
    pub fn load() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        tracing::debug!("no config file found, using defaults");
        AppConfig::default().finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.apply_env()?;
        self.sanitize();
        tracing::debug!(config = ?self, "configuration resolved");
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = env::var(ENV_STORE_CREDENTIALS) {
            self.store_credentials = (!v.trim().is_empty()).then(|| PathBuf::from(v.trim()));
        }
        if let Ok(v) = env::var(ENV_DEFAULT_TOPICS) {
            self.default_topics_source = PathBuf::from(v);
        }
        if let Ok(v) = env::var(ENV_HISTORY_LIMIT) {
            // Unparsable → keep the file/default value.
            if let Ok(n) = v.trim().parse() {
                self.history_limit = Some(n);
            }
        }
        if let Ok(v) = env::var(ENV_STORE_BACKEND) {
            self.store.backend = v.parse()?;
        }
        if let Ok(v) = env::var(ENV_DATA_DIR) {
            self.store.data_dir = PathBuf::from(v);
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        self.history_limit = self
            .history_limit
            .filter(|&n| n > 0)
            .map(|n| n.min(MAX_HISTORY_LIMIT));
    }

    /// One-shot processes must not save into a store that dies with them.
    pub fn require_durable_store(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Memory {
            bail!(
                "store backend 'memory' does not outlive this process; \
                 set [store] backend = \"file\" or {ENV_STORE_BACKEND}=file to save"
            );
        }
        Ok(())
    }

    /// Load credentials if configured. Malformed credentials are fatal.
    pub fn load_credentials(&self) -> Result<Option<StoreCredentials>> {
        self.store_credentials
            .as_deref()
            .map(StoreCredentials::load_from_file)
            .transpose()
    }
}
