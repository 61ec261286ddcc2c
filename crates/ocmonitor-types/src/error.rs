use thiserror::Error;

/// Result type for ocmonitor-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the types layer
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown storage source name
    #[error("Unknown source '{0}' (expected one of: auto, sqlite, files)")]
    UnknownSource(String),
}
