//! Fixtures for OpenCode storage layouts.
//!
//! Provides utilities to:
//! - Create an `opencode.db` with the `project`/`session`/`message` tables
//! - Lay out a legacy `storage/message` tree with nested sub-agent directories
//! - Describe messages once and render them for either backend

use anyhow::Result;
use rusqlite::{Connection, params};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

/// Base timestamp (epoch ms) used by fixtures: 2023-11-14T22:13:20Z
pub const BASE_MS: i64 = 1_700_000_000_000;

/// Declarative description of one message document.
#[derive(Debug, Clone)]
pub struct MessageSpec {
    pub id: String,
    pub role: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub created_ms: i64,
    pub completed_ms: Option<i64>,
    pub project_root: Option<String>,
}

impl MessageSpec {
    /// Assistant message with no tokens yet.
    pub fn assistant(id: &str, created_ms: i64) -> Self {
        Self {
            id: id.to_string(),
            role: "assistant".to_string(),
            provider: Some("anthropic".to_string()),
            model: Some("claude-sonnet-4".to_string()),
            input: 0,
            output: 0,
            reasoning: 0,
            cache_read: 0,
            cache_write: 0,
            created_ms,
            completed_ms: None,
            project_root: None,
        }
    }

    /// User message (never carries a model or tokens).
    pub fn user(id: &str, created_ms: i64) -> Self {
        Self {
            role: "user".to_string(),
            provider: None,
            model: None,
            ..Self::assistant(id, created_ms)
        }
    }

    pub fn model(mut self, provider: &str, model: &str) -> Self {
        self.provider = Some(provider.to_string());
        self.model = Some(model.to_string());
        self
    }

    pub fn tokens(mut self, input: u64, output: u64) -> Self {
        self.input = input;
        self.output = output;
        self
    }

    pub fn cache(mut self, read: u64, write: u64) -> Self {
        self.cache_read = read;
        self.cache_write = write;
        self
    }

    pub fn reasoning(mut self, reasoning: u64) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn completed_after(mut self, duration_ms: i64) -> Self {
        self.completed_ms = Some(self.created_ms + duration_ms);
        self
    }

    pub fn project_root(mut self, root: &str) -> Self {
        self.project_root = Some(root.to_string());
        self
    }

    /// Render the message document as OpenCode stores it.
    pub fn to_json(&self, session_id: &str) -> Value {
        let mut time = json!({ "created": self.created_ms });
        if let Some(completed) = self.completed_ms {
            time["completed"] = json!(completed);
        }

        let mut doc = json!({
            "id": self.id,
            "sessionID": session_id,
            "role": self.role,
            "time": time,
            "tokens": {
                "input": self.input,
                "output": self.output,
                "reasoning": self.reasoning,
                "cache": { "read": self.cache_read, "write": self.cache_write }
            }
        });
        if let Some(provider) = &self.provider {
            doc["providerID"] = json!(provider);
        }
        if let Some(model) = &self.model {
            doc["modelID"] = json!(model);
        }
        if let Some(root) = &self.project_root {
            doc["path"] = json!({ "cwd": root, "root": root });
        }
        doc
    }
}

/// Builder for an OpenCode SQLite database.
pub struct SqliteFixture {
    path: PathBuf,
    conn: Connection,
}

impl SqliteFixture {
    /// Create (or reuse) a database file with the OpenCode tables.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS project (
                id TEXT PRIMARY KEY,
                worktree TEXT
            );

            CREATE TABLE IF NOT EXISTS session (
                id TEXT PRIMARY KEY,
                project_id TEXT,
                parent_id TEXT,
                title TEXT,
                time_created INTEGER NOT NULL,
                time_updated INTEGER
            );

            CREATE TABLE IF NOT EXISTS message (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                time_created INTEGER NOT NULL,
                data TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_project(&self, id: &str, worktree: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO project (id, worktree) VALUES (?1, ?2)",
            params![id, worktree],
        )?;
        Ok(())
    }

    pub fn add_session(
        &self,
        id: &str,
        project_id: Option<&str>,
        parent_id: Option<&str>,
        created_ms: i64,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO session (id, project_id, parent_id, title, time_created, time_updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
            params![id, project_id, parent_id, format!("Session {}", id), created_ms],
        )?;
        Ok(())
    }

    pub fn add_message(&self, session_id: &str, message: &MessageSpec) -> Result<()> {
        let data = message.to_json(session_id).to_string();
        self.add_raw_message(&message.id, session_id, message.created_ms, &data)
    }

    /// Insert a message row with an arbitrary `data` payload (for malformed cases).
    pub fn add_raw_message(
        &self,
        id: &str,
        session_id: &str,
        created_ms: i64,
        data: &str,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO message (id, session_id, time_created, data)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![id, session_id, created_ms, data],
        )?;
        Ok(())
    }
}

/// Builder for a legacy `storage/message` tree.
///
/// Sub-agents are nested inside their parent's directory:
/// `message/ses_root/ses_child/msg_1.json`.
pub struct FileStoreFixture {
    root: PathBuf,
}

impl FileStoreFixture {
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a session given its ancestry, e.g. `&["ses_a", "ses_b"]`.
    pub fn session_dir(&self, chain: &[&str]) -> PathBuf {
        chain
            .iter()
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Write a message into the session at the end of `chain`.
    pub fn add_message(&self, chain: &[&str], message: &MessageSpec) -> Result<PathBuf> {
        let session_id = chain
            .last()
            .ok_or_else(|| anyhow::anyhow!("session chain must not be empty"))?;
        let content = serde_json::to_string_pretty(&message.to_json(session_id))?;
        self.add_raw(chain, &format!("{}.json", message.id), &content)
    }

    /// Write an arbitrary file into a session directory.
    pub fn add_raw(&self, chain: &[&str], file_name: &str, content: &str) -> Result<PathBuf> {
        let dir = self.session_dir(chain);
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        fs::write(&path, content)?;
        Ok(path)
    }
}
