use chrono::{DateTime, Utc};
use ocmonitor_types::{InteractionRecord, SessionRecord, SourceKind, datetime_from_millis};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::message::{MessageDocument, sort_interactions};
use crate::traits::{Loaded, StorageAdapter};
use crate::{Error, Result};

// NOTE: Read-only access to OpenCode's own database (v1.2.0+)
//
// - The database belongs to OpenCode; we open it READ_ONLY on every call so a
//   poll never holds a handle across ticks and never takes a write lock.
// - OpenCode may be writing concurrently (WAL mode), hence the busy timeout.
// - parent_id is a real column, so hierarchy comes straight from the row.

const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Relational backend: `opencode.db`
#[derive(Debug, Clone)]
pub struct SqliteAdapter {
    db_path: PathBuf,
}

impl SqliteAdapter {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn connect(&self) -> Result<Connection> {
        if !self.db_path.is_file() {
            return Err(Error::unavailable(
                SourceKind::Relational,
                format!("database not found: {}", self.db_path.display()),
            ));
        }

        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            Error::unavailable(
                SourceKind::Relational,
                format!("cannot open {}: {}", self.db_path.display(), e),
            )
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn has_session_table(conn: &Connection) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'session'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

struct SessionRow {
    id: String,
    parent_id: Option<String>,
    title: Option<String>,
    time_created: Option<i64>,
    worktree: Option<String>,
}

impl SessionRow {
    fn into_record(self) -> Option<SessionRecord> {
        let created_at: DateTime<Utc> = self.time_created.and_then(datetime_from_millis)?;
        Some(SessionRecord {
            id: self.id,
            parent_id: self.parent_id.filter(|p| !p.is_empty()),
            project_path: self.worktree.filter(|w| !w.is_empty() && w != "/"),
            title: self.title,
            source: SourceKind::Relational,
            created_at,
        })
    }
}

impl StorageAdapter for SqliteAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Relational
    }

    fn location(&self) -> &Path {
        &self.db_path
    }

    fn probe(&self) -> bool {
        match self.connect() {
            Ok(conn) => Self::has_session_table(&conn).unwrap_or(false),
            Err(_) => false,
        }
    }

    fn list_sessions(&self) -> Result<Loaded<SessionRecord>> {
        let conn = self.connect()?;
        if !Self::has_session_table(&conn)? {
            return Err(Error::unavailable(
                SourceKind::Relational,
                "database has no session table",
            ));
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT s.id, s.parent_id, s.title, s.time_created, p.worktree
            FROM session s
            LEFT JOIN project p ON p.id = s.project_id
            ORDER BY s.time_created, s.id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SessionRow {
                    id: row.get(0)?,
                    parent_id: row.get(1)?,
                    title: row.get(2)?,
                    time_created: row.get(3)?,
                    worktree: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut malformed = 0;
        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row.into_record() {
                Some(record) => sessions.push(record),
                None => {
                    malformed += 1;
                    tracing::warn!(session_id = %id, "skipping session row without a valid creation time");
                }
            }
        }

        tracing::debug!(
            count = sessions.len(),
            malformed,
            path = %self.db_path.display(),
            "loaded sessions from database"
        );
        Ok(Loaded::new(sessions, malformed))
    }

    fn list_interactions(&self, session_id: &str) -> Result<Loaded<InteractionRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, session_id, time_created, data
            FROM message
            WHERE session_id = ?1
            ORDER BY time_created, id
            "#,
        )?;

        let rows = stmt
            .query_map([session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut malformed = 0;
        let mut interactions = Vec::with_capacity(rows.len());
        for (id, row_session, time_created, data) in rows {
            let parsed = data
                .as_deref()
                .map(MessageDocument::parse)
                .transpose()
                .ok()
                .flatten();
            let record = parsed.and_then(|doc| {
                doc.into_interaction(
                    id.clone(),
                    row_session,
                    time_created.and_then(datetime_from_millis),
                )
            });

            match record {
                Some(record) => interactions.push(record),
                None => {
                    malformed += 1;
                    tracing::warn!(message_id = %id, session_id, "skipping malformed message row");
                }
            }
        }

        sort_interactions(&mut interactions);
        Ok(Loaded::new(interactions, malformed))
    }
}
