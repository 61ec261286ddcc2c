use anyhow::{Context, Result};
use chrono::Utc;
use ocmonitor_engine::{ActivityStatus, CostCalculator, context_usage};
use ocmonitor_providers::{DataLoader, StorageAdapter};
use ocmonitor_runtime::{
    Config, LiveWorkflowTracker, PriceReport, StopSignal, SystemClock, TickDelta, TrackerEvent,
    load_prices,
};
use ocmonitor_types::{InteractionRecord, ModelRef};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use crate::args::SourceArgs;
use crate::format;

/// Interactions of the followed workflow as reported so far, with prices for
/// every model seen in them
struct LiveView<'a> {
    config: &'a Config,
    cwd: &'a Path,
    no_remote: bool,
    workflow_id: Option<String>,
    interactions: BTreeMap<String, InteractionRecord>,
    models: BTreeSet<ModelRef>,
    prices: Option<PriceReport>,
    waiting_shown: bool,
}

impl<'a> LiveView<'a> {
    fn new(config: &'a Config, cwd: &'a Path, no_remote: bool) -> Self {
        Self {
            config,
            cwd,
            no_remote,
            workflow_id: None,
            interactions: BTreeMap::new(),
            models: BTreeSet::new(),
            prices: None,
            waiting_shown: false,
        }
    }

    fn on_event(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::WorkflowSelected { root_id, session_ids } => {
                println!(
                    "Tracking workflow {} ({} session(s))",
                    root_id,
                    session_ids.len()
                );
            }
            TrackerEvent::WorkflowSwitched { from, to } => {
                println!("Switched to workflow {} (was {})", to, from);
            }
            TrackerEvent::SubAgentDiscovered {
                session_id,
                parent_id,
            } => match parent_id {
                Some(parent) => println!("Sub-agent {} started (parent {})", session_id, parent),
                None => println!("Sub-agent {} started", session_id),
            },
            TrackerEvent::Waiting { message } => {
                if !self.waiting_shown {
                    println!("{}", message);
                    self.waiting_shown = true;
                }
            }
            TrackerEvent::Error(message) => eprintln!("warning: {}", message),
            TrackerEvent::Tick(delta) => self.on_tick(delta),
        }
    }

    fn on_tick(&mut self, delta: TickDelta) {
        if self.workflow_id.as_deref() != Some(delta.workflow_id.as_str()) {
            self.workflow_id = Some(delta.workflow_id.clone());
            self.interactions.clear();
        } else if delta.is_empty() {
            return;
        }

        for record in &delta.new_interactions {
            self.interactions.insert(record.id.clone(), record.clone());
        }
        for update in &delta.updated {
            if let Some(record) = self.interactions.get_mut(&update.id) {
                record.tokens = update.current;
            }
        }
        self.refresh_prices();

        let prices = self.prices.as_ref();
        let cost = prices
            .map(|p| CostCalculator::new(&p.prices).totals(self.interactions.values()))
            .unwrap_or_default();

        println!(
            "[{}] +{} new, {} updated | {} interaction(s) | {} | cost {}",
            delta.at.format("%H:%M:%S"),
            delta.new_interactions.len(),
            delta.updated.len(),
            delta.interaction_count,
            format::tokens(&delta.totals),
            cost
        );

        if let Some(latest) = &delta.latest {
            let window = latest
                .model
                .as_ref()
                .and_then(|m| prices.and_then(|p| p.context_window(m)));
            let context = context_usage(latest, window);
            println!(
                "  rate {:.1} tok/s | context {:.1}% of {} | {}",
                delta.output_rate,
                context.percent,
                format::count(context.window),
                ActivityStatus::since(latest.timestamp, Utc::now())
            );
        }
    }

    /// Re-resolve prices when a model shows up for the first time
    fn refresh_prices(&mut self) {
        let before = self.models.len();
        self.models
            .extend(self.interactions.values().filter_map(|r| r.model.clone()));
        if self.prices.is_some() && self.models.len() == before {
            return;
        }
        let models: Vec<ModelRef> = self.models.iter().cloned().collect();
        self.prices = Some(load_prices(
            &self.config.pricing,
            self.cwd,
            &models,
            self.no_remote,
        ));
    }
}

pub fn handle(
    config: &Config,
    cwd: &Path,
    source: &SourceArgs,
    interval: Option<u64>,
) -> Result<()> {
    let paths = config.source_paths()?;
    let loader = DataLoader::select(&paths, source.source)?;
    let interval = interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.live.interval());

    println!(
        "Watching {} ({}) every {}s, Ctrl-C to stop",
        loader.kind(),
        loader.location().display(),
        interval.as_secs()
    );

    let stop = StopSignal::new();
    let on_interrupt = stop.clone();
    ctrlc::set_handler(move || on_interrupt.stop()).context("cannot install Ctrl-C handler")?;

    let handle = LiveWorkflowTracker::new(loader, SystemClock, interval).spawn(stop)?;
    let mut view = LiveView::new(config, cwd, source.no_remote);
    for event in handle.receiver().iter() {
        view.on_event(event);
    }
    handle.join()?;

    println!("Stopped.");
    Ok(())
}
