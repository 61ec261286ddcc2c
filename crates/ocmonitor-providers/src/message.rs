//! OpenCode message document, shared by both backends.
//!
//! The relational backend stores it in `message.data`; the file backend
//! stores one document per `msg_*.json` file.

use chrono::{DateTime, Utc};
use ocmonitor_types::{InteractionRecord, ModelRef, TokenUsage, datetime_from_millis};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MessageDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "modelID")]
    pub model_id: Option<String>,
    #[serde(default, rename = "providerID")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub time: MessageTime,
    #[serde(default)]
    pub tokens: MessageTokens,
    #[serde(default)]
    pub path: Option<MessagePath>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MessageTime {
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub completed: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MessageTokens {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub reasoning: u64,
    #[serde(default)]
    pub cache: CacheTokens,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CacheTokens {
    #[serde(default)]
    pub read: u64,
    #[serde(default)]
    pub write: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MessagePath {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
}

impl MessageDocument {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Reasoning tokens are billed as output.
    pub fn token_usage(&self) -> TokenUsage {
        TokenUsage::new(
            self.tokens.input,
            self.tokens.output + self.tokens.reasoning,
            self.tokens.cache.read,
            self.tokens.cache.write,
        )
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.time.created.and_then(datetime_from_millis)
    }

    pub fn project_path(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        path.root
            .clone()
            .filter(|r| !r.is_empty() && r != "/")
            .or_else(|| path.cwd.clone())
            .filter(|p| !p.is_empty())
    }

    /// Build the interaction record.
    ///
    /// `id` and `session_id` are the authoritative identifiers from the
    /// backend (row columns or file/directory names); `fallback_created` is
    /// used when the document carries no creation time. Returns None when no
    /// timestamp can be established.
    pub fn into_interaction(
        self,
        id: String,
        session_id: String,
        fallback_created: Option<DateTime<Utc>>,
    ) -> Option<InteractionRecord> {
        let timestamp = self.created_at().or(fallback_created)?;
        let tokens = self.token_usage();
        let completed_at = self.time.completed.and_then(datetime_from_millis);
        let model = self
            .model_id
            .filter(|m| !m.is_empty())
            .map(|m| ModelRef::new(self.provider_id, m));

        Some(InteractionRecord {
            id,
            session_id,
            role: self.role.unwrap_or_else(|| "assistant".to_string()),
            model,
            tokens,
            timestamp,
            completed_at,
        })
    }
}

/// Sort interactions by timestamp, breaking ties by id.
pub(crate) fn sort_interactions(items: &mut [InteractionRecord]) {
    items.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}
