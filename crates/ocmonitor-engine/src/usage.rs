use chrono::{DateTime, Duration, Utc};
use ocmonitor_types::{InteractionRecord, TokenUsage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::tree::Workflow;

/// Context window assumed when no price tier supplies one
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

/// Window for the recent output rate
const RATE_WINDOW_MINUTES: i64 = 5;

/// Token usage attributed to one model
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelUsage {
    pub tokens: TokenUsage,
    pub interactions: usize,
}

/// Aggregated usage for a workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowUsage {
    pub root_id: String,
    pub session_count: usize,
    pub interactions: usize,
    pub tokens: TokenUsage,
    /// Keyed by the model's display form (`provider/model`)
    pub by_model: BTreeMap<String, ModelUsage>,
    pub first_activity: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl WorkflowUsage {
    pub fn new(workflow: &Workflow) -> Self {
        Self {
            root_id: workflow.id().to_string(),
            session_count: workflow.sessions().len(),
            interactions: 0,
            tokens: TokenUsage::default(),
            by_model: BTreeMap::new(),
            first_activity: None,
            last_activity: None,
        }
    }

    pub fn from_interactions<'r, I>(workflow: &Workflow, records: I) -> Self
    where
        I: IntoIterator<Item = &'r InteractionRecord>,
    {
        let mut usage = Self::new(workflow);
        for record in records {
            usage.add(record);
        }
        usage
    }

    pub fn add(&mut self, record: &InteractionRecord) {
        self.interactions += 1;
        self.tokens += record.tokens;

        if let Some(model) = &record.model {
            let entry = self.by_model.entry(model.to_string()).or_default();
            entry.tokens += record.tokens;
            entry.interactions += 1;
        }

        self.first_activity = Some(
            self.first_activity
                .map_or(record.timestamp, |t| t.min(record.timestamp)),
        );
        self.last_activity = Some(
            self.last_activity
                .map_or(record.timestamp, |t| t.max(record.timestamp)),
        );
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.last_activity? - self.first_activity?)
    }
}

/// How recently a workflow produced an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Active,
    Recent,
    Idle,
    Inactive,
}

impl ActivityStatus {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        match elapsed.num_seconds() {
            s if s < 60 => ActivityStatus::Active,
            s if s < 300 => ActivityStatus::Recent,
            s if s < 1800 => ActivityStatus::Idle,
            _ => ActivityStatus::Inactive,
        }
    }

    pub fn since(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::from_elapsed(now - last_activity)
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityStatus::Active => "active",
            ActivityStatus::Recent => "recent",
            ActivityStatus::Idle => "idle",
            ActivityStatus::Inactive => "inactive",
        };
        write!(f, "{}", s)
    }
}

/// Output tokens per second of active processing over the last five minutes.
///
/// Only interactions with a completion time contribute processing time;
/// returns 0.0 when there is none.
pub fn output_rate<'r, I>(records: I, now: DateTime<Utc>) -> f64
where
    I: IntoIterator<Item = &'r InteractionRecord>,
{
    let cutoff = now - Duration::minutes(RATE_WINDOW_MINUTES);
    let (output, duration_ms) = records
        .into_iter()
        .filter(|r| r.timestamp >= cutoff)
        .fold((0u64, 0i64), |(output, ms), r| {
            (output + r.tokens.output, ms + r.duration_ms().unwrap_or(0))
        });

    if output == 0 || duration_ms <= 0 {
        return 0.0;
    }
    output as f64 / (duration_ms as f64 / 1000.0)
}

/// Context window fill for one interaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContextUsage {
    pub tokens: u64,
    pub window: u64,
    /// 0..=100
    pub percent: f64,
}

pub fn context_usage(record: &InteractionRecord, context_window: Option<u64>) -> ContextUsage {
    let window = context_window
        .filter(|w| *w > 0)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW);
    let tokens = record.tokens.context_tokens();
    let percent = (tokens as f64 / window as f64 * 100.0).min(100.0);

    ContextUsage {
        tokens,
        window,
        percent,
    }
}
