use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Environment variable overriding the OpenCode data directory
pub const DATA_DIR_ENV: &str = "OPENCODE_DATA_DIR";

const DATABASE_FILE: &str = "opencode.db";

/// Resolve the OpenCode data directory based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. OPENCODE_DATA_DIR environment variable (with tilde expansion)
/// 3. System data directory
/// 4. ~/.local/share/opencode
pub fn resolve_data_dir(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var(DATA_DIR_ENV)
        && !env_path.is_empty()
    {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("opencode"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".local/share/opencode"));
    }

    Err(Error::Config(
        "Could not determine OpenCode data directory: no HOME directory or system data directory found"
            .to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

/// Locations of both backends under one data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub database: PathBuf,
    pub storage: PathBuf,
}

impl SourcePaths {
    pub fn from_data_dir(data_dir: &Path) -> Self {
        Self {
            database: data_dir.join(DATABASE_FILE),
            storage: data_dir.join("storage").join("message"),
        }
    }

    /// Override either location individually (config `[sources]`)
    pub fn with_overrides(mut self, database: Option<PathBuf>, storage: Option<PathBuf>) -> Self {
        if let Some(database) = database {
            self.database = database;
        }
        if let Some(storage) = storage {
            self.storage = storage;
        }
        self
    }
}
