use ocmonitor_types::{InteractionRecord, SessionRecord, SourceKind};
use std::path::Path;

use crate::files::FileAdapter;
use crate::paths::SourcePaths;
use crate::source::{SourceMode, StorageSource};
use crate::sqlite::SqliteAdapter;
use crate::traits::{Loaded, StorageAdapter};
use crate::{Error, Result};

/// Probe results for both backends, independent of the active selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub sqlite: bool,
    pub files: bool,
}

impl Availability {
    pub fn any(&self) -> bool {
        self.sqlite || self.files
    }
}

/// Picks the active backend once per process and keeps it.
///
/// Responsibilities:
/// - Forced mode: use the requested backend, fail if it does not probe
/// - Auto mode: database first, file tree second, fail only if neither probes
/// - Diagnostics: probe either backend at any time without changing selection
#[derive(Debug, Clone)]
pub struct DataLoader {
    sqlite: SqliteAdapter,
    files: FileAdapter,
    active: StorageSource,
}

impl DataLoader {
    pub fn select(paths: &SourcePaths, mode: SourceMode) -> Result<Self> {
        Self::from_adapters(
            SqliteAdapter::new(&paths.database),
            FileAdapter::new(&paths.storage),
            mode,
        )
    }

    pub fn from_adapters(
        sqlite: SqliteAdapter,
        files: FileAdapter,
        mode: SourceMode,
    ) -> Result<Self> {
        let active = match mode {
            SourceMode::Forced(SourceKind::Relational) => {
                if !sqlite.probe() {
                    return Err(Error::unavailable(
                        SourceKind::Relational,
                        format!("requested database is not usable: {}", sqlite.location().display()),
                    ));
                }
                StorageSource::Relational(sqlite.clone())
            }
            SourceMode::Forced(SourceKind::FlatFile) => {
                if !files.probe() {
                    return Err(Error::unavailable(
                        SourceKind::FlatFile,
                        format!("requested storage directory is not usable: {}", files.location().display()),
                    ));
                }
                StorageSource::FlatFile(files.clone())
            }
            SourceMode::Auto => {
                if sqlite.probe() {
                    StorageSource::Relational(sqlite.clone())
                } else if files.probe() {
                    tracing::info!(
                        database = %sqlite.location().display(),
                        "database not available, falling back to file storage"
                    );
                    StorageSource::FlatFile(files.clone())
                } else {
                    return Err(Error::NoSourceAvailable {
                        database: sqlite.location().to_path_buf(),
                        storage: files.location().to_path_buf(),
                    });
                }
            }
        };

        tracing::info!(
            source = %active.kind(),
            %mode,
            location = %active.location().display(),
            "selected session source"
        );

        Ok(Self {
            sqlite,
            files,
            active,
        })
    }

    pub fn sqlite_available(&self) -> bool {
        self.sqlite.probe()
    }

    pub fn files_available(&self) -> bool {
        self.files.probe()
    }

    pub fn availability(&self) -> Availability {
        Availability {
            sqlite: self.sqlite_available(),
            files: self.files_available(),
        }
    }

    pub fn active(&self) -> &StorageSource {
        &self.active
    }
}

/// Probe both backends without selecting one (setup validation).
pub fn probe_all(paths: &SourcePaths) -> Availability {
    Availability {
        sqlite: SqliteAdapter::new(&paths.database).probe(),
        files: FileAdapter::new(&paths.storage).probe(),
    }
}

impl StorageAdapter for DataLoader {
    fn kind(&self) -> SourceKind {
        self.active.kind()
    }

    fn location(&self) -> &Path {
        self.active.location()
    }

    fn probe(&self) -> bool {
        self.active.probe()
    }

    fn list_sessions(&self) -> Result<Loaded<SessionRecord>> {
        self.active.list_sessions()
    }

    fn list_interactions(&self, session_id: &str) -> Result<Loaded<InteractionRecord>> {
        self.active.list_interactions(session_id)
    }
}
