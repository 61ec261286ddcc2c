use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::tiers::PriceTable;
use crate::{Error, Result};

/// On-disk snapshot of the remote price table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub source_url: String,
    pub models: PriceTable,
}

impl CacheEntry {
    pub fn new(models: PriceTable, source_url: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            fetched_at: Utc::now(),
            ttl_seconds,
            source_url: source_url.into(),
            models,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    /// Older than its own TTL
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.age(now).num_seconds() > self.ttl_seconds as i64
    }
}

/// Reads and atomically replaces the shared cache file.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current entry, if one exists and parses. Never takes the lock.
    pub fn read(&self) -> Option<CacheEntry> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read price cache");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt price cache");
                None
            }
        }
    }

    /// Replace the cache file. The document is written to a temporary file in
    /// the same directory and renamed over the target, so readers only ever
    /// see a complete file. Callers hold the cache lock.
    pub fn write(&self, entry: &CacheEntry) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let bytes = serde_json::to_vec_pretty(entry)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;

        tracing::debug!(
            path = %self.path.display(),
            models = entry.models.len(),
            "wrote price cache"
        );
        Ok(())
    }
}
