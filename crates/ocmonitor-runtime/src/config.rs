use ocmonitor_pricing::PricingConfig;
use ocmonitor_providers::{SourcePaths, expand_tilde, resolve_data_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// `[sources]`: where OpenCode keeps its data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub data_dir: Option<String>,
    pub database_path: Option<String>,
    pub storage_path: Option<String>,
}

/// `[live]`: polling behaviour of the live tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub refresh_interval_seconds: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: 5,
        }
    }
}

impl LiveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds.max(1))
    }
}

/// Contents of `config.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub pricing: PricingConfig,
    pub live: LiveConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.expand_paths();
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `<config_dir>/ocmonitor/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ocmonitor").join("config.toml"))
    }

    /// Backend locations: `[sources]` overrides on top of the data directory.
    pub fn source_paths(&self) -> Result<SourcePaths> {
        let data_dir = resolve_data_dir(self.sources.data_dir.as_deref())?;
        Ok(SourcePaths::from_data_dir(&data_dir).with_overrides(
            self.sources.database_path.as_deref().map(expand_tilde),
            self.sources.storage_path.as_deref().map(expand_tilde),
        ))
    }

    fn expand_paths(&mut self) {
        let expand = |p: &mut Option<PathBuf>| {
            if let Some(expanded) = p.as_deref().and_then(Path::to_str).map(expand_tilde) {
                *p = Some(expanded);
            }
        };
        expand(&mut self.pricing.remote_cache_path);
        expand(&mut self.pricing.user_file);
    }
}
