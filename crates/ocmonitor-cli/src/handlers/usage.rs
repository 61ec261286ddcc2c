use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate};
use ocmonitor_engine::{DateRange, Period};
use ocmonitor_providers::DataLoader;
use ocmonitor_runtime::{Config, PeriodReport, load_period_report, load_prices};
use std::path::Path;

use crate::args::SourceArgs;
use crate::format;

pub fn handle(
    config: &Config,
    cwd: &Path,
    source: &SourceArgs,
    period: Period,
    range: DateRange,
    breakdown: bool,
) -> Result<()> {
    let paths = config.source_paths()?;
    let loader = DataLoader::select(&paths, source.source)?;

    let report = load_period_report(&loader, period, range, |models| {
        load_prices(&config.pricing, cwd, models, source.no_remote)
    })?;

    print_report(&report, breakdown);
    Ok(())
}

/// `--month YYYY-MM`
pub fn month_range(month: Option<&str>) -> Result<DateRange> {
    let Some(month) = month else {
        return Ok(DateRange::all());
    };
    let first = NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d")
        .with_context(|| format!("invalid month '{}', expected YYYY-MM", month))?;
    DateRange::month(first.year(), first.month())
        .with_context(|| format!("month '{}' is out of range", month))
}

/// `--year YYYY`
pub fn year_range(year: Option<i32>) -> Result<DateRange> {
    match year {
        None => Ok(DateRange::all()),
        Some(year) => match DateRange::year(year) {
            Some(range) => Ok(range),
            None => bail!("year {} is out of range", year),
        },
    }
}

fn print_report(report: &PeriodReport, breakdown: bool) {
    println!("Source: {} ({})", report.source, report.location.display());

    if report.buckets.is_empty() {
        println!("No usage found.");
    }

    for bucket in &report.buckets {
        println!("{}  {}", bucket.label, format::tally(&bucket.tally));
        if breakdown {
            for (model, tally) in &bucket.tally.by_model {
                println!(
                    "    {}: {} interaction(s), {}  {}",
                    model,
                    tally.usage.interactions,
                    format::tokens(&tally.usage.tokens),
                    tally.cost
                );
            }
        }
    }

    if !report.buckets.is_empty() {
        println!();
        println!("Total ({}): {}", report.period, format::tally(&report.total));
        println!("Cost: {}", report.total.cost);
    }
    if report.malformed > 0 {
        println!("Skipped {} malformed record(s)", report.malformed);
    }
    if let Some(warning) = report.remote.warning() {
        println!("Note: {}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_range_accepts_year_month() {
        let range = month_range(Some("2024-02")).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(month_range(None).unwrap(), DateRange::all());
    }

    #[test]
    fn test_month_range_rejects_garbage() {
        assert!(month_range(Some("2024-13")).is_err());
        assert!(month_range(Some("february")).is_err());
    }
}
