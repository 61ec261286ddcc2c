use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_REMOTE_URL: &str = "https://models.dev/api.json";

/// `[pricing]` section of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Use the remote tier at all
    pub remote_fallback: bool,
    pub remote_url: String,
    pub remote_timeout_seconds: u64,
    pub remote_cache_ttl_hours: u64,
    /// Defaults to `<cache_dir>/ocmonitor/models-dev.json`
    pub remote_cache_path: Option<PathBuf>,
    /// Defaults to `<config_dir>/ocmonitor/models.json`
    pub user_file: Option<PathBuf>,
    /// Relative paths are resolved against the working directory
    pub project_file: PathBuf,
    pub allow_stale_cache_on_error: bool,
    pub lock_timeout_ms: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            remote_fallback: true,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            remote_timeout_seconds: 10,
            remote_cache_ttl_hours: 24,
            remote_cache_path: None,
            user_file: None,
            project_file: PathBuf::from("models.json"),
            allow_stale_cache_on_error: true,
            lock_timeout_ms: 2_000,
        }
    }
}

impl PricingConfig {
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.remote_cache_path
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("ocmonitor").join("models-dev.json")))
    }

    pub fn user_file_path(&self) -> Option<PathBuf> {
        self.user_file
            .clone()
            .or_else(|| dirs::config_dir().map(|d| d.join("ocmonitor").join("models.json")))
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.remote_cache_ttl_hours.saturating_mul(3600)
    }
}
