use std::path::PathBuf;
use thiserror::Error;

/// Result type for ocmonitor-pricing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reading or writing local pricing state
#[derive(Debug, Error)]
pub enum Error {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Atomic replace of the cache file failed
    #[error("Failed to replace {}: {}", .path.display(), .source)]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Why a remote fetch produced no data. Never fatal: the fetcher degrades to
/// the cache or to an empty remote tier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("request to {url} failed with HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("invalid pricing payload from {url}: {reason}")]
    Parse { url: String, reason: String },
}

/// Cache lock could not be taken
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("timed out after {waited_ms}ms waiting for lock {}", .path.display())]
    Timeout { path: PathBuf, waited_ms: u64 },

    #[error("cannot open lock {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },
}
