use ocmonitor_types::SourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ocmonitor-providers operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the storage layer
#[derive(Debug, Error)]
pub enum Error {
    /// A backend could not be opened or read. Recoverable by falling back to
    /// the other backend.
    #[error("{kind} storage unavailable: {reason}")]
    StorageUnavailable { kind: SourceKind, reason: String },

    /// Neither backend is usable
    #[error(
        "No session data source found. Expected SQLite database at {} or file storage at {}",
        .database.display(),
        .storage.display()
    )]
    NoSourceAvailable { database: PathBuf, storage: PathBuf },

    /// Data directory could not be determined
    #[error("Config error: {0}")]
    Config(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walkdir error
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl Error {
    pub fn unavailable(kind: SourceKind, reason: impl Into<String>) -> Self {
        Error::StorageUnavailable {
            kind,
            reason: reason.into(),
        }
    }

    /// True for errors the loader recovers from by trying another backend
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::StorageUnavailable { .. })
    }
}
