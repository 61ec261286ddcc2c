// Engine module - workflow assembly and usage analysis
// This layer sits between storage records (providers) and the runtime/CLI

pub mod aggregate;
pub mod cost;
pub mod tree;
pub mod usage;

pub use aggregate::{
    DateRange, ModelTally, Period, PeriodUsage, ProjectUsage, UsageTally, usage_by_period,
    usage_by_project,
};
pub use cost::{Cost, CostCalculator, CostTotals};
pub use tree::{CycleDetected, SessionForest, SessionTreeBuilder, Workflow, WorkflowNode};
pub use usage::{
    ActivityStatus, ContextUsage, DEFAULT_CONTEXT_WINDOW, ModelUsage, WorkflowUsage,
    context_usage, output_rate,
};

use ocmonitor_types::SessionRecord;

// Façade API - stable entry points for the runtime layer

/// Assemble session records into workflows
pub fn build_forest(sessions: &[SessionRecord]) -> SessionForest {
    SessionTreeBuilder::new().build(sessions)
}
