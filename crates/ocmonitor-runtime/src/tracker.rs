use chrono::{DateTime, Utc};
use ocmonitor_engine::{Workflow, build_forest, output_rate};
use ocmonitor_providers::StorageAdapter;
use ocmonitor_types::{InteractionRecord, TokenUsage};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, channel};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::clock::Clock;
use crate::{Error, Result};

/// Longest single sleep between stop checks
const STOP_CHECK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Polling,
    Stopped,
}

/// Cooperative cancellation shared between the tracker and its owner.
/// Checked between ticks only.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An already-seen interaction whose token counts changed
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionUpdate {
    pub id: String,
    pub session_id: String,
    pub previous: TokenUsage,
    pub current: TokenUsage,
}

/// What changed in the tracked workflow during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickDelta {
    pub tick: u64,
    pub workflow_id: String,
    pub new_interactions: Vec<InteractionRecord>,
    pub updated: Vec<InteractionUpdate>,
    /// Tokens added by this tick (new interactions plus growth of updated ones)
    pub token_delta: TokenUsage,
    /// Workflow totals after this tick
    pub totals: TokenUsage,
    pub interaction_count: usize,
    /// Most recent interaction in the workflow
    pub latest: Option<InteractionRecord>,
    /// Output tokens per second over the recent window
    pub output_rate: f64,
    pub at: DateTime<Utc>,
}

impl TickDelta {
    pub fn is_empty(&self) -> bool {
        self.new_interactions.is_empty() && self.updated.is_empty()
    }
}

/// NOTE: TrackerEvent ordering within one tick
/// - WorkflowSelected / WorkflowSwitched come first, then SubAgentDiscovered, then Tick
/// - Events of a tick are only published once the whole tick succeeded
/// - A failed tick publishes a single Error and leaves the tracked state untouched
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    WorkflowSelected {
        root_id: String,
        session_ids: Vec<String>,
    },
    WorkflowSwitched {
        from: String,
        to: String,
    },
    SubAgentDiscovered {
        session_id: String,
        parent_id: Option<String>,
    },
    Tick(TickDelta),
    Waiting {
        message: String,
    },
    Error(String),
}

/// Follows the current workflow of one storage backend.
///
/// Responsibilities:
/// - Pick the workflow to follow and switch when a newer root appears
/// - Re-read only the followed workflow's sessions each tick
/// - Report each interaction id once, plus later token growth, never double counting
/// - Run ticks back to back on one thread, sleeping through the rest of the interval
pub struct LiveWorkflowTracker<S: StorageAdapter, C: Clock> {
    storage: S,
    clock: C,
    interval: Duration,
    state: TrackerState,
    workflow: Option<Workflow>,
    known_sessions: BTreeSet<String>,
    seen: BTreeMap<String, InteractionRecord>,
    ticks: u64,
}

/// Tracked state computed by a tick before it is committed
struct Pending {
    workflow: Workflow,
    known_sessions: BTreeSet<String>,
    seen: BTreeMap<String, InteractionRecord>,
}

impl<S: StorageAdapter, C: Clock> LiveWorkflowTracker<S, C> {
    pub fn new(storage: S, clock: C, interval: Duration) -> Self {
        Self {
            storage,
            clock,
            interval,
            state: TrackerState::Idle,
            workflow: None,
            known_sessions: BTreeSet::new(),
            seen: BTreeMap::new(),
            ticks: 0,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn workflow(&self) -> Option<&Workflow> {
        self.workflow.as_ref()
    }

    /// Interactions accounted for so far, by id
    pub fn interactions(&self) -> impl Iterator<Item = &InteractionRecord> {
        self.seen.values()
    }

    pub fn totals(&self) -> TokenUsage {
        self.seen.values().map(|r| &r.tokens).sum()
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Select the workflow to follow: the most recently created root. With no
    /// sessions at all the tracker keeps polling and selects on a later tick.
    pub fn start(&mut self) -> Result<Vec<TrackerEvent>> {
        match self.state {
            TrackerState::Stopped => {
                return Err(Error::InvalidOperation(
                    "tracker has been stopped".to_string(),
                ));
            }
            TrackerState::Polling => return Ok(Vec::new()),
            TrackerState::Idle => {}
        }

        let sessions = self.storage.list_sessions()?;
        let forest = build_forest(&sessions.items);
        self.state = TrackerState::Polling;

        let event = match forest.latest().cloned() {
            Some(workflow) => {
                let event = selected_event(&workflow);
                self.known_sessions = workflow.session_ids().into_iter().collect();
                tracing::info!(root = %workflow.id(), sessions = self.known_sessions.len(), "tracking workflow");
                self.workflow = Some(workflow);
                event
            }
            None => waiting_event(),
        };
        Ok(vec![event])
    }

    /// One poll. Nothing is committed unless every read succeeds.
    pub fn tick(&mut self) -> Result<Vec<TrackerEvent>> {
        match self.state {
            TrackerState::Stopped => {
                return Err(Error::InvalidOperation(
                    "tracker has been stopped".to_string(),
                ));
            }
            TrackerState::Idle => self.state = TrackerState::Polling,
            TrackerState::Polling => {}
        }
        let mut events = Vec::new();

        let sessions = self.storage.list_sessions()?;
        let forest = build_forest(&sessions.items);
        if sessions.malformed > 0 {
            tracing::debug!(malformed = sessions.malformed, "skipped malformed sessions");
        }

        let (workflow, fresh) = match &self.workflow {
            None => match forest.latest() {
                Some(latest) => (latest.clone(), true),
                None => {
                    self.ticks += 1;
                    events.push(waiting_event());
                    return Ok(events);
                }
            },
            Some(current) => match forest.latest() {
                Some(latest)
                    if latest.id() != current.id()
                        && latest.created_at() > current.created_at()
                        && !current.contains(latest.id()) =>
                {
                    events.push(TrackerEvent::WorkflowSwitched {
                        from: current.id().to_string(),
                        to: latest.id().to_string(),
                    });
                    (latest.clone(), true)
                }
                _ => (
                    forest
                        .get(current.id())
                        .cloned()
                        .unwrap_or_else(|| current.clone()),
                    false,
                ),
            },
        };

        if fresh && self.workflow.is_none() {
            events.push(selected_event(&workflow));
        }

        let pending = self.read_workflow(workflow, fresh, &mut events)?;
        let delta = self.commit(pending);
        events.push(TrackerEvent::Tick(delta));
        Ok(events)
    }

    fn read_workflow(
        &self,
        workflow: Workflow,
        fresh: bool,
        events: &mut Vec<TrackerEvent>,
    ) -> Result<Pending> {
        let mut known_sessions = if fresh {
            BTreeSet::new()
        } else {
            self.known_sessions.clone()
        };

        let mut records = Vec::new();
        for session in workflow.sessions() {
            if known_sessions.insert(session.id.clone()) && !fresh {
                events.push(TrackerEvent::SubAgentDiscovered {
                    session_id: session.id.clone(),
                    parent_id: session.parent_id.clone(),
                });
            }
            let loaded = self.storage.list_interactions(&session.id)?;
            records.extend(loaded.items);
        }

        let mut seen = if fresh {
            BTreeMap::new()
        } else {
            self.seen.clone()
        };
        for record in records {
            seen.insert(record.id.clone(), record);
        }

        Ok(Pending {
            workflow,
            known_sessions,
            seen,
        })
    }

    fn commit(&mut self, pending: Pending) -> TickDelta {
        let switched = self
            .workflow
            .as_ref()
            .is_none_or(|w| w.id() != pending.workflow.id());
        let previous = if switched {
            BTreeMap::new()
        } else {
            std::mem::take(&mut self.seen)
        };

        let mut new_interactions = Vec::new();
        let mut updated = Vec::new();
        let mut token_delta = TokenUsage::default();
        for (id, record) in &pending.seen {
            match previous.get(id) {
                None => {
                    token_delta += record.tokens;
                    new_interactions.push(record.clone());
                }
                Some(before) if before.tokens != record.tokens => {
                    token_delta += record.tokens.saturating_sub(&before.tokens);
                    updated.push(InteractionUpdate {
                        id: id.clone(),
                        session_id: record.session_id.clone(),
                        previous: before.tokens,
                        current: record.tokens,
                    });
                }
                Some(_) => {}
            }
        }
        new_interactions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        self.ticks += 1;
        self.workflow = Some(pending.workflow);
        self.known_sessions = pending.known_sessions;
        self.seen = pending.seen;

        let now = self.clock.now();
        let latest = self
            .seen
            .values()
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
            .cloned();
        let workflow_id = self
            .workflow
            .as_ref()
            .map(|w| w.id().to_string())
            .unwrap_or_default();

        tracing::debug!(
            tick = self.ticks,
            workflow = %workflow_id,
            new = new_interactions.len(),
            updated = updated.len(),
            "tick complete"
        );

        TickDelta {
            tick: self.ticks,
            workflow_id,
            new_interactions,
            updated,
            token_delta,
            totals: self.totals(),
            interaction_count: self.seen.len(),
            latest,
            output_rate: output_rate(self.seen.values(), now),
            at: now,
        }
    }

    /// Poll until `stop` is raised. Errors are reported as events and polling
    /// continues; the in-flight tick always completes before stopping.
    pub fn run<F>(&mut self, stop: &StopSignal, mut on_event: F)
    where
        F: FnMut(TrackerEvent),
    {
        while !stop.is_stopped() {
            let began = self.clock.now();
            match self.tick() {
                Ok(events) => events.into_iter().for_each(&mut on_event),
                Err(e) => {
                    tracing::warn!(error = %e, "live tick failed");
                    on_event(TrackerEvent::Error(e.to_string()));
                }
            }

            let elapsed = (self.clock.now() - began).to_std().unwrap_or_default();
            self.pause(self.interval.saturating_sub(elapsed), stop);
        }
        self.state = TrackerState::Stopped;
        tracing::info!(ticks = self.ticks, "live tracking stopped");
    }

    fn pause(&self, mut remaining: Duration, stop: &StopSignal) {
        while !remaining.is_zero() && !stop.is_stopped() {
            let step = remaining.min(STOP_CHECK);
            self.clock.sleep(step);
            remaining -= step;
        }
    }
}

impl<S, C> LiveWorkflowTracker<S, C>
where
    S: StorageAdapter + 'static,
    C: Clock + 'static,
{
    /// Run the poll loop on its own thread, publishing events on a channel.
    /// The channel closes once the loop has stopped.
    pub fn spawn(mut self, stop: StopSignal) -> Result<TrackerHandle> {
        let (tx, rx) = channel();
        let loop_stop = stop.clone();

        let join = std::thread::Builder::new()
            .name("live-workflow-tracker".to_string())
            .spawn(move || {
                self.run(&loop_stop, |event| {
                    if tx.send(event).is_err() {
                        loop_stop.stop();
                    }
                });
            })?;

        Ok(TrackerHandle {
            receiver: rx,
            stop,
            join,
        })
    }
}

pub struct TrackerHandle {
    receiver: Receiver<TrackerEvent>,
    stop: StopSignal,
    join: JoinHandle<()>,
}

impl TrackerHandle {
    pub fn receiver(&self) -> &Receiver<TrackerEvent> {
        &self.receiver
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn join(self) -> Result<()> {
        self.join
            .join()
            .map_err(|_| Error::InvalidOperation("live tracker thread panicked".to_string()))
    }
}

fn selected_event(workflow: &Workflow) -> TrackerEvent {
    TrackerEvent::WorkflowSelected {
        root_id: workflow.id().to_string(),
        session_ids: workflow.session_ids(),
    }
}

fn waiting_event() -> TrackerEvent {
    TrackerEvent::Waiting {
        message: "No sessions found yet, waiting for OpenCode activity".to_string(),
    }
}
