use ocmonitor_engine::{
    CostCalculator, DateRange, Period, PeriodUsage, ProjectUsage, UsageTally, Workflow,
    build_forest, usage_by_period, usage_by_project,
};
use ocmonitor_pricing::RemoteStatus;
use ocmonitor_providers::StorageAdapter;
use ocmonitor_types::{InteractionRecord, ModelRef, SourceKind};
use std::path::PathBuf;

use crate::Result;
use crate::prices::PriceReport;
use crate::sessions::{models_in, read_workflows};

/// Usage grouped into calendar buckets
#[derive(Debug, Clone)]
pub struct PeriodReport {
    pub source: SourceKind,
    pub location: PathBuf,
    pub period: Period,
    pub range: DateRange,
    /// Oldest first
    pub buckets: Vec<PeriodUsage>,
    pub total: UsageTally,
    pub malformed: usize,
    pub remote: RemoteStatus,
}

/// Usage grouped by project
#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub source: SourceKind,
    pub location: PathBuf,
    pub range: DateRange,
    /// Highest cost first
    pub projects: Vec<ProjectUsage>,
    pub total: UsageTally,
    pub malformed: usize,
    pub remote: RemoteStatus,
}

/// Every workflow with its interactions inside `range`
struct InRange {
    workflows: Vec<(Workflow, Vec<InteractionRecord>)>,
    malformed: usize,
}

fn read_in_range<A>(storage: &A, range: &DateRange) -> Result<InRange>
where
    A: StorageAdapter + ?Sized,
{
    let sessions = storage.list_sessions()?;
    let forest = build_forest(&sessions.items);

    let mut malformed = sessions.malformed;
    let mut workflows = Vec::new();
    for (workflow, records, skipped) in read_workflows(storage, forest.workflows)? {
        malformed += skipped;
        let records: Vec<InteractionRecord> = records
            .into_iter()
            .filter(|r| range.contains_time(r.timestamp))
            .collect();
        if !records.is_empty() {
            workflows.push((workflow, records));
        }
    }
    Ok(InRange {
        workflows,
        malformed,
    })
}

fn total_of<'a, I>(tallies: I) -> UsageTally
where
    I: IntoIterator<Item = &'a UsageTally>,
{
    let mut total = UsageTally::default();
    for tally in tallies {
        total.merge(tally);
    }
    total
}

fn warn_incomplete(total: &UsageTally) {
    if !total.cost.is_complete() {
        tracing::warn!(
            models = ?total.cost.unpriced_models,
            interactions = total.cost.unpriced_interactions,
            "no price known for some models, totals are incomplete"
        );
    }
}

/// Usage of the active backend by day, week or month.
///
/// `prices` is called once with every model used inside `range`.
pub fn load_period_report<A, P>(
    storage: &A,
    period: Period,
    range: DateRange,
    prices: P,
) -> Result<PeriodReport>
where
    A: StorageAdapter + ?Sized,
    P: FnOnce(&[ModelRef]) -> PriceReport,
{
    let data = read_in_range(storage, &range)?;
    let records = || data.workflows.iter().flat_map(|(_, records)| records);

    let report = prices(&models_in(records()));
    let calculator = CostCalculator::new(&report.prices);
    let buckets = usage_by_period(records(), period, &range, &calculator);
    let total = total_of(buckets.iter().map(|b| &b.tally));
    warn_incomplete(&total);

    Ok(PeriodReport {
        source: storage.kind(),
        location: storage.location().to_path_buf(),
        period,
        range,
        buckets,
        total,
        malformed: data.malformed,
        remote: report.remote,
    })
}

/// Usage of the active backend by project. Sub-agent sessions count toward
/// the project of their workflow's root.
pub fn load_project_report<A, P>(storage: &A, range: DateRange, prices: P) -> Result<ProjectReport>
where
    A: StorageAdapter + ?Sized,
    P: FnOnce(&[ModelRef]) -> PriceReport,
{
    let data = read_in_range(storage, &range)?;

    let report = prices(&models_in(
        data.workflows.iter().flat_map(|(_, records)| records),
    ));
    let calculator = CostCalculator::new(&report.prices);
    let items = data.workflows.iter().flat_map(|(workflow, records)| {
        let root = workflow.root_session();
        records.iter().map(move |record| (root, record))
    });
    let projects = usage_by_project(items, &range, &calculator);
    let total = total_of(projects.iter().map(|p| &p.tally));
    warn_incomplete(&total);

    Ok(ProjectReport {
        source: storage.kind(),
        location: storage.location().to_path_buf(),
        range,
        projects,
        total,
        malformed: data.malformed,
        remote: report.remote,
    })
}
