use ocmonitor_types::{InteractionRecord, SessionRecord, SourceKind};
use std::path::Path;

use crate::Result;

/// Result of a full read: the records that parsed plus a count of the ones
/// that were skipped as malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub malformed: usize,
}

impl<T> Loaded<T> {
    pub fn new(items: Vec<T>, malformed: usize) -> Self {
        Self { items, malformed }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            malformed: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Read-only access to one session store
///
/// Responsibilities:
/// - Cheap availability check that never fails for "not present"
/// - Full session listing with parent links resolved the backend's way
/// - Per-session interaction listing ordered by timestamp
pub trait StorageAdapter: Send {
    /// Which backend this adapter reads
    fn kind(&self) -> SourceKind;

    /// Database file or storage root this adapter points at
    fn location(&self) -> &Path;

    /// Check whether the backend exists and can be opened
    fn probe(&self) -> bool;

    /// Read every session. Records that cannot be parsed are skipped and counted.
    fn list_sessions(&self) -> Result<Loaded<SessionRecord>>;

    /// Read the interactions of one session, ordered by timestamp.
    /// An unknown session id yields an empty result.
    fn list_interactions(&self, session_id: &str) -> Result<Loaded<InteractionRecord>>;
}
