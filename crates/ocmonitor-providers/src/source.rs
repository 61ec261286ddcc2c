use ocmonitor_types::{InteractionRecord, SessionRecord, SourceKind};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::files::FileAdapter;
use crate::sqlite::SqliteAdapter;
use crate::traits::{Loaded, StorageAdapter};
use crate::Result;

/// The active backend. Only the loader constructs one; everything downstream
/// talks to it through `StorageAdapter`.
#[derive(Debug, Clone)]
pub enum StorageSource {
    Relational(SqliteAdapter),
    FlatFile(FileAdapter),
}

impl StorageSource {
    fn adapter(&self) -> &dyn StorageAdapter {
        match self {
            StorageSource::Relational(adapter) => adapter,
            StorageSource::FlatFile(adapter) => adapter,
        }
    }
}

impl StorageAdapter for StorageSource {
    fn kind(&self) -> SourceKind {
        self.adapter().kind()
    }

    fn location(&self) -> &Path {
        self.adapter().location()
    }

    fn probe(&self) -> bool {
        self.adapter().probe()
    }

    fn list_sessions(&self) -> Result<Loaded<SessionRecord>> {
        self.adapter().list_sessions()
    }

    fn list_interactions(&self, session_id: &str) -> Result<Loaded<InteractionRecord>> {
        self.adapter().list_interactions(session_id)
    }
}

/// How the loader picks a backend (`--source auto|sqlite|files`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    /// Prefer the database, fall back to the file tree
    #[default]
    Auto,
    /// Use exactly this backend or fail
    Forced(SourceKind),
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::Auto => write!(f, "auto"),
            SourceMode::Forced(kind) => write!(f, "{}", kind),
        }
    }
}

impl FromStr for SourceMode {
    type Err = ocmonitor_types::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(SourceMode::Auto);
        }
        s.parse::<SourceKind>().map(SourceMode::Forced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_mode_parsing() {
        assert_eq!("auto".parse::<SourceMode>().unwrap(), SourceMode::Auto);
        assert_eq!(
            "sqlite".parse::<SourceMode>().unwrap(),
            SourceMode::Forced(SourceKind::Relational)
        );
        assert_eq!(
            "files".parse::<SourceMode>().unwrap(),
            SourceMode::Forced(SourceKind::FlatFile)
        );
        assert!("postgres".parse::<SourceMode>().is_err());
    }

    #[test]
    fn test_source_delegates_kind() {
        let source = StorageSource::FlatFile(FileAdapter::new("/nonexistent"));
        assert_eq!(source.kind(), SourceKind::FlatFile);
        assert_eq!(source.location(), Path::new("/nonexistent"));
        assert!(!source.probe());
    }
}
