// Error types
pub mod error;

// Adapter contract
pub mod traits;

// Backend implementations
pub mod files;
pub mod sqlite;

// Shared message document parsing
mod message;

// Source selection
pub mod loader;
pub mod paths;
pub mod source;

pub use error::{Error, Result};
pub use files::FileAdapter;
pub use loader::{Availability, DataLoader, probe_all};
pub use paths::{DATA_DIR_ENV, SourcePaths, expand_tilde, resolve_data_dir};
pub use source::{SourceMode, StorageSource};
pub use sqlite::SqliteAdapter;
pub use traits::{Loaded, StorageAdapter};
