use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Base directory for config, profile, and anything else the shell keeps between runs.
pub fn granite_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".granite-shell")
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub replicate: ReplicateConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Connection settings for the Replicate predictions API.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicateConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,
    /// Seconds the API may hold the create call open (`Prefer: wait=N`). 0 disables it.
    #[serde(default = "default_sync_wait")]
    pub sync_wait_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token_env: default_api_token_env(),
            sync_wait_secs: default_sync_wait(),
            poll_interval_ms: default_poll_interval(),
            max_wait_secs: default_max_wait(),
            request_timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct StorageConfig {
    /// Overrides the default `~/.granite-shell/profile.json`.
    pub profile_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn profile_path(&self) -> PathBuf {
        self.profile_path
            .clone()
            .unwrap_or_else(|| granite_dir().join("profile.json"))
    }
}

fn default_base_url() -> String {
    "https://api.replicate.com/v1".into()
}
fn default_api_token_env() -> String {
    "REPLICATE_API_TOKEN".into()
}
fn default_sync_wait() -> u64 {
    60
}
fn default_poll_interval() -> u64 {
    1000
}
fn default_max_wait() -> u64 {
    300
}
fn default_timeout() -> u64 {
    180
}

impl Config {
    pub fn default_path() -> PathBuf {
        granite_dir().join("config.toml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    /// Like [`Config::load`] but a missing file means defaults. A file that exists and
    /// fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Token from the configured env var, if set and non-empty.
    pub fn token_from_env(&self) -> Option<String> {
        std::env::var(&self.replicate.api_token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}
