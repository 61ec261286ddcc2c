use ocmonitor_engine::{CostCalculator, CostTotals, CycleDetected, Workflow, WorkflowUsage, build_forest};
use ocmonitor_pricing::RemoteStatus;
use ocmonitor_providers::StorageAdapter;
use ocmonitor_types::{InteractionRecord, ModelRef, SourceKind, TokenUsage};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::Result;
use crate::prices::PriceReport;

/// One workflow with its usage and cost
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub workflow: Workflow,
    pub usage: WorkflowUsage,
    pub cost: CostTotals,
    /// Interactions skipped as malformed across the workflow's sessions
    pub malformed: usize,
}

/// Static view over every workflow of the active backend
#[derive(Debug, Clone)]
pub struct SessionsReport {
    pub source: SourceKind,
    pub location: PathBuf,
    /// Newest first, at most `limit` when one was given
    pub workflows: Vec<WorkflowReport>,
    /// Workflows left out by the limit
    pub omitted: usize,
    pub orphans: Vec<String>,
    pub cycles: Vec<CycleDetected>,
    pub malformed_sessions: usize,
    pub malformed_interactions: usize,
    pub tokens: TokenUsage,
    pub cost: CostTotals,
    pub remote: RemoteStatus,
}

impl SessionsReport {
    pub fn session_count(&self) -> usize {
        self.workflows.iter().map(|w| w.usage.session_count).sum()
    }
}

/// Interactions of every session in each workflow, plus the malformed count
pub(crate) fn read_workflows<A>(
    storage: &A,
    workflows: Vec<Workflow>,
) -> Result<Vec<(Workflow, Vec<InteractionRecord>, usize)>>
where
    A: StorageAdapter + ?Sized,
{
    let mut loaded = Vec::with_capacity(workflows.len());
    for workflow in workflows {
        let mut records = Vec::new();
        let mut malformed = 0;
        for session in workflow.sessions() {
            let interactions = storage.list_interactions(&session.id)?;
            malformed += interactions.malformed;
            records.extend(interactions.items);
        }
        loaded.push((workflow, records, malformed));
    }
    Ok(loaded)
}

/// Distinct models, sorted
pub(crate) fn models_in<'r, I>(records: I) -> Vec<ModelRef>
where
    I: IntoIterator<Item = &'r InteractionRecord>,
{
    records
        .into_iter()
        .filter_map(|r| r.model.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Read sessions and interactions, assemble workflows and price them.
///
/// `prices` is called once with every model that appears in the selected
/// workflows.
pub fn load_sessions_report<A, P>(
    storage: &A,
    limit: Option<usize>,
    prices: P,
) -> Result<SessionsReport>
where
    A: StorageAdapter + ?Sized,
    P: FnOnce(&[ModelRef]) -> PriceReport,
{
    let sessions = storage.list_sessions()?;
    let forest = build_forest(&sessions.items);

    let total = forest.workflows.len();
    let selected: Vec<Workflow> = forest
        .workflows
        .iter()
        .take(limit.unwrap_or(total))
        .cloned()
        .collect();

    let loaded = read_workflows(storage, selected)?;
    let models = models_in(loaded.iter().flat_map(|(_, records, _)| records));
    let report = prices(&models);
    let calculator = CostCalculator::new(&report.prices);

    let mut tokens = TokenUsage::default();
    let mut cost = CostTotals::default();
    let mut malformed_interactions = 0;
    let mut workflows = Vec::with_capacity(loaded.len());
    for (workflow, records, malformed) in loaded {
        let usage = WorkflowUsage::from_interactions(&workflow, &records);
        let workflow_cost = calculator.totals(&records);

        tokens += usage.tokens;
        cost.merge(&workflow_cost);
        malformed_interactions += malformed;
        workflows.push(WorkflowReport {
            workflow,
            usage,
            cost: workflow_cost,
            malformed,
        });
    }

    if !cost.is_complete() {
        tracing::warn!(
            models = ?cost.unpriced_models,
            interactions = cost.unpriced_interactions,
            "no price known for some models, totals are incomplete"
        );
    }

    Ok(SessionsReport {
        source: storage.kind(),
        location: storage.location().to_path_buf(),
        workflows,
        omitted: total.saturating_sub(limit.unwrap_or(total)),
        orphans: forest.orphans,
        cycles: forest.cycles,
        malformed_sessions: sessions.malformed,
        malformed_interactions,
        tokens,
        cost,
        remote: report.remote,
    })
}
