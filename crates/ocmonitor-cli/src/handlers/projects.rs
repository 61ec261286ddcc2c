use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use ocmonitor_engine::DateRange;
use ocmonitor_providers::DataLoader;
use ocmonitor_runtime::{Config, ProjectReport, load_prices, load_project_report};
use std::path::Path;

use crate::args::SourceArgs;
use crate::format;

pub fn handle(config: &Config, cwd: &Path, source: &SourceArgs, range: DateRange) -> Result<()> {
    let paths = config.source_paths()?;
    let loader = DataLoader::select(&paths, source.source)?;

    let report = load_project_report(&loader, range, |models| {
        load_prices(&config.pricing, cwd, models, source.no_remote)
    })?;

    print_report(&report);
    Ok(())
}

/// `--start-date` / `--end-date`, both inclusive
pub fn date_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange> {
    let start = start.map(parse_date).transpose()?;
    let end = end.map(parse_date).transpose()?;
    if let (Some(start), Some(end)) = (start, end)
        && start > end
    {
        bail!("start date {} is after end date {}", start, end);
    }
    Ok(DateRange::between(start, end))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

fn print_report(report: &ProjectReport) {
    println!("Source: {} ({})", report.source, report.location.display());

    if report.projects.is_empty() {
        println!("No usage found.");
    }

    for project in &report.projects {
        println!("{}  {}", project.name, format::tally(&project.tally));
        if let Some(path) = &project.path {
            println!("  {}", path);
        }
    }

    if !report.projects.is_empty() {
        println!();
        println!(
            "Total: {} project(s), {}",
            report.projects.len(),
            format::tally(&report.total)
        );
        println!("Cost: {}", report.total.cost);
    }
    if report.malformed > 0 {
        println!("Skipped {} malformed record(s)", report.malformed);
    }
    if let Some(warning) = report.remote.warning() {
        println!("Note: {}", warning);
    }
}
