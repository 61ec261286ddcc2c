use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::model::ModelRef;
use super::usage::TokenUsage;
use crate::Error;

/// Storage backend a record was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// OpenCode SQLite database (v1.2.0+)
    Relational,
    /// Legacy per-session JSON file tree
    FlatFile,
}

impl SourceKind {
    /// Name used on the command line (`--source sqlite|files`)
    pub fn cli_name(&self) -> &'static str {
        match self {
            SourceKind::Relational => "sqlite",
            SourceKind::FlatFile => "files",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cli_name())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "relational" | "db" => Ok(SourceKind::Relational),
            "files" | "file" | "flatfile" => Ok(SourceKind::FlatFile),
            other => Err(Error::UnknownSource(other.to_string())),
        }
    }
}

/// One session as read from a storage backend.
///
/// Records are immutable snapshots: a fresh read produces new records rather
/// than mutating previously loaded ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session identifier (e.g. `ses_8f2a...`)
    pub id: String,
    /// Parent session for sub-agents; None for top-level sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Project worktree the session ran in, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    /// Session title, when the backend stores one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub source: SourceKind,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A sub-agent is any session that names a parent.
    pub fn is_sub_agent(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Last path component of the project worktree, or "unknown".
    pub fn project_name(&self) -> &str {
        self.project_path
            .as_deref()
            .and_then(|p| p.trim_end_matches(['/', '\\']).rsplit(['/', '\\']).next())
            .filter(|name| !name.is_empty())
            .unwrap_or("unknown")
    }
}

/// One message (interaction) within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,
    pub session_id: String,
    /// "user" or "assistant"
    pub role: String,
    /// Model that produced the message (assistant messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,
    pub tokens: TokenUsage,
    pub timestamp: DateTime<Utc>,
    /// Completion time; with `timestamp` gives the active processing duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl InteractionRecord {
    /// Processing duration in milliseconds, if the message completed.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.timestamp).num_milliseconds())
            .filter(|ms| *ms >= 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(parent: Option<&str>, project: Option<&str>) -> SessionRecord {
        SessionRecord {
            id: "ses_1".to_string(),
            parent_id: parent.map(String::from),
            project_path: project.map(String::from),
            title: None,
            source: SourceKind::Relational,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_is_sub_agent() {
        assert!(!session(None, None).is_sub_agent());
        assert!(session(Some("ses_0"), None).is_sub_agent());
    }

    #[test]
    fn test_project_name() {
        assert_eq!(session(None, Some("/home/u/work/app")).project_name(), "app");
        assert_eq!(session(None, Some("/home/u/work/app/")).project_name(), "app");
        assert_eq!(session(None, None).project_name(), "unknown");
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("sqlite".parse::<SourceKind>().unwrap(), SourceKind::Relational);
        assert_eq!("files".parse::<SourceKind>().unwrap(), SourceKind::FlatFile);
        assert!("postgres".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_duration_ms() {
        let start = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut record = InteractionRecord {
            id: "msg_1".to_string(),
            session_id: "ses_1".to_string(),
            role: "assistant".to_string(),
            model: None,
            tokens: TokenUsage::default(),
            timestamp: start,
            completed_at: None,
        };
        assert_eq!(record.duration_ms(), None);

        record.completed_at = Some(start + chrono::Duration::milliseconds(2500));
        assert_eq!(record.duration_ms(), Some(2500));
    }
}
