use chrono::{DateTime, Utc};
use ocmonitor_pricing::{CacheStore, PricingConfig};
use ocmonitor_providers::{FileAdapter, SourcePaths, SqliteAdapter, StorageAdapter};
use ocmonitor_types::SourceKind;
use std::path::{Path, PathBuf};

pub const NO_SOURCE_MESSAGE: &str =
    "No session data source found. Expected SQLite database or file storage.";

#[derive(Debug, Clone, PartialEq)]
pub struct BackendStatus {
    pub kind: SourceKind,
    pub location: PathBuf,
    pub available: bool,
    /// Readable session count; None when unavailable or the read failed
    pub sessions: Option<usize>,
    pub malformed: usize,
    pub error: Option<String>,
}

impl BackendStatus {
    fn check(adapter: &dyn StorageAdapter) -> Self {
        let mut status = Self {
            kind: adapter.kind(),
            location: adapter.location().to_path_buf(),
            available: adapter.probe(),
            sessions: None,
            malformed: 0,
            error: None,
        };
        if !status.available {
            return status;
        }

        match adapter.list_sessions() {
            Ok(loaded) => {
                status.sessions = Some(loaded.len());
                status.malformed = loaded.malformed;
            }
            Err(e) => {
                tracing::warn!(source = %status.kind, error = %e, "backend probed but could not be read");
                status.error = Some(e.to_string());
            }
        }
        status
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheInfo {
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
    pub models: usize,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingStatus {
    pub user_file: Option<PathBuf>,
    pub user_file_exists: bool,
    pub project_file: PathBuf,
    pub project_file_exists: bool,
    pub remote_enabled: bool,
    pub cache_path: Option<PathBuf>,
    pub cache: Option<CacheInfo>,
}

impl PricingStatus {
    /// Some tier could supply prices
    pub fn any_source(&self) -> bool {
        self.user_file_exists || self.project_file_exists || self.remote_enabled || self.cache.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupReport {
    pub backends: Vec<BackendStatus>,
    pub pricing: PricingStatus,
}

impl SetupReport {
    /// At least one session backend is usable
    pub fn is_valid(&self) -> bool {
        self.backends.iter().any(|b| b.available)
    }

    pub fn backend(&self, kind: SourceKind) -> Option<&BackendStatus> {
        self.backends.iter().find(|b| b.kind == kind)
    }

    /// Problems worth showing, in display order
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.is_valid() {
            problems.push(NO_SOURCE_MESSAGE.to_string());
        }
        for backend in &self.backends {
            if let Some(error) = &backend.error {
                problems.push(format!("{} backend unreadable: {}", backend.kind, error));
            }
        }
        if !self.pricing.any_source() {
            problems.push("No pricing source configured; costs will be reported as unpriced.".to_string());
        }
        problems
    }
}

/// Inspect both backends and the pricing sources without touching the network.
pub fn validate_setup(paths: &SourcePaths, pricing: &PricingConfig, project_dir: &Path) -> SetupReport {
    let sqlite = SqliteAdapter::new(paths.database.clone());
    let files = FileAdapter::new(paths.storage.clone());
    let backends = vec![BackendStatus::check(&sqlite), BackendStatus::check(&files)];

    let user_file = pricing.user_file_path();
    let project_file = project_dir.join(&pricing.project_file);
    let cache_path = pricing.cache_path();
    let cache = cache_path
        .as_deref()
        .and_then(|path| CacheStore::new(path).read())
        .map(|entry| CacheInfo {
            stale: entry.is_stale(Utc::now()),
            fetched_at: entry.fetched_at,
            models: entry.models.len(),
            source_url: entry.source_url,
        });

    let report = SetupReport {
        backends,
        pricing: PricingStatus {
            user_file_exists: user_file.as_deref().is_some_and(Path::is_file),
            user_file,
            project_file_exists: project_file.is_file(),
            project_file,
            remote_enabled: pricing.remote_fallback,
            cache_path,
            cache,
        },
    };

    tracing::debug!(valid = report.is_valid(), "setup validated");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_nothing_present_is_invalid() {
        let temp = TempDir::new().unwrap();
        let paths = SourcePaths::from_data_dir(temp.path());
        let pricing = PricingConfig {
            remote_fallback: false,
            user_file: Some(temp.path().join("none.json")),
            remote_cache_path: Some(temp.path().join("cache.json")),
            ..Default::default()
        };

        let report = validate_setup(&paths, &pricing, temp.path());

        assert!(!report.is_valid());
        assert_eq!(report.backends.len(), 2);
        assert!(!report.pricing.any_source());
        assert_eq!(report.problems()[0], NO_SOURCE_MESSAGE);
    }

    #[test]
    fn test_flat_files_alone_are_valid() {
        let temp = TempDir::new().unwrap();
        let paths = SourcePaths::from_data_dir(temp.path());
        std::fs::create_dir_all(&paths.storage).unwrap();

        let report = validate_setup(&paths, &PricingConfig::default(), temp.path());

        assert!(report.is_valid());
        let files = report.backend(SourceKind::FlatFile).unwrap();
        assert!(files.available);
        assert_eq!(files.sessions, Some(0));
        assert!(!report.backend(SourceKind::Relational).unwrap().available);
    }
}
