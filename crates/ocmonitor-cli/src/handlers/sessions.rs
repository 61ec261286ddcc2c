use anyhow::Result;
use ocmonitor_providers::DataLoader;
use ocmonitor_runtime::{Config, SessionsReport, WorkflowReport, load_prices, load_sessions_report};
use std::path::Path;

use crate::args::SourceArgs;
use crate::format;

pub fn handle(config: &Config, cwd: &Path, source: &SourceArgs, limit: Option<usize>) -> Result<()> {
    let paths = config.source_paths()?;
    let loader = DataLoader::select(&paths, source.source)?;

    let report = load_sessions_report(&loader, limit, |models| {
        load_prices(&config.pricing, cwd, models, source.no_remote)
    })?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &SessionsReport) {
    println!("Source: {} ({})", report.source, report.location.display());

    if report.workflows.is_empty() {
        println!("No sessions found.");
        return;
    }

    for workflow in &report.workflows {
        println!();
        print_workflow(workflow);
    }

    println!();
    println!(
        "Total: {} workflow(s), {} session(s), {}",
        report.workflows.len(),
        report.session_count(),
        format::tokens(&report.tokens)
    );
    println!("Cost: {}", report.cost);

    if report.omitted > 0 {
        println!("{} older workflow(s) not shown", report.omitted);
    }
    if !report.orphans.is_empty() {
        println!(
            "Shown as roots (parent not found): {}",
            report.orphans.join(", ")
        );
    }
    for cycle in &report.cycles {
        println!("Excluded: {} ({} session(s))", cycle, cycle.excluded.len());
    }
    let malformed = report.malformed_sessions + report.malformed_interactions;
    if malformed > 0 {
        println!("Skipped {} malformed record(s)", malformed);
    }
    if let Some(warning) = report.remote.warning() {
        println!("Note: {}", warning);
    }
}

fn print_workflow(report: &WorkflowReport) {
    let root = report.workflow.root_session();
    let title = root.title.as_deref().unwrap_or("(untitled)");
    println!(
        "{}  {}  [{}]",
        root.id,
        title,
        root.project_name()
    );
    println!(
        "  started {}  sessions={}  interactions={}",
        root.created_at.format("%Y-%m-%d %H:%M:%S"),
        report.usage.session_count,
        report.usage.interactions
    );
    if let Some(duration) = report.usage.duration() {
        println!("  active for {}", format::duration(duration));
    }
    println!("  tokens: {}", format::tokens(&report.usage.tokens));
    println!("  cost: {}", report.cost);

    for (model, usage) in &report.usage.by_model {
        println!(
            "    {}: {} interaction(s), {}",
            model,
            usage.interactions,
            format::tokens(&usage.tokens)
        );
    }

    for (node, depth) in report.workflow.root.walk().into_iter().skip(1) {
        println!("  {}└ {} (sub-agent)", "  ".repeat(depth - 1), node.session.id);
    }
}
