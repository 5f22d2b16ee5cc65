// src/config/credentials.rs
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fmt, fs, path::Path};

/// Service-account style credentials for the backing store.
/// `project_id` namespaces the data on disk.
#[derive(Clone, Deserialize)]
pub struct StoreCredentials {
    pub project_id: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub private_key: String,
}

impl StoreCredentials {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading store credentials from {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("invalid credentials in {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let mut c: StoreCredentials = serde_json::from_str(s)?;
        c.project_id = c.project_id.trim().to_string();
        if c.project_id.is_empty() {
            bail!("project_id must not be empty");
        }
        if c.project_id.contains(['/', '\\']) || c.project_id == ".." {
            bail!("project_id must be a plain name: {}", c.project_id);
        }
        // Secrets pasted through env/TOML often carry literal "\n" escapes.
        c.private_key = c.private_key.replace("\\n", "\n");
        Ok(c)
    }
}

// Never print the key.
impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
