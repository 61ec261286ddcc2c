use ocmonitor_engine::{DateRange, Period};
use ocmonitor_pricing::PricingConfig;
use ocmonitor_providers::{DataLoader, SourceMode, SourcePaths};
use ocmonitor_runtime::{load_period_report, load_prices, load_project_report};
use ocmonitor_testing::fixtures::BASE_MS;
use ocmonitor_testing::{MessageSpec, SqliteFixture};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const DAY_MS: i64 = 86_400_000;

/// BASE_MS is 2023-11-14 UTC. Workflow A (app) has a sub-agent B working on
/// the next day; workflow L (lib) runs a month later.
fn seed(temp: &TempDir) -> anyhow::Result<(SourcePaths, PathBuf, PricingConfig)> {
    let paths = SourcePaths::from_data_dir(&temp.path().join("opencode"));
    let db = SqliteFixture::create(&paths.database)?;
    db.add_project("prj_app", "/work/app")?;
    db.add_project("prj_lib", "/work/lib")?;
    db.add_session("A", Some("prj_app"), None, BASE_MS)?;
    db.add_session("B", Some("prj_app"), Some("A"), BASE_MS + 1_000)?;
    db.add_session("L", Some("prj_lib"), None, BASE_MS + 30 * DAY_MS)?;

    let sonnet =
        |id: &str, at: i64| MessageSpec::assistant(id, at).model("anthropic", "claude-sonnet-4");
    db.add_message("A", &sonnet("m1", BASE_MS + 100).tokens(1_000_000, 0))?;
    db.add_message("B", &sonnet("m2", BASE_MS + DAY_MS).tokens(0, 100_000))?;
    db.add_message("L", &sonnet("m3", BASE_MS + 30 * DAY_MS).tokens(1_000_000, 0))?;

    let project = temp.path().join("project");
    fs::create_dir_all(&project)?;
    fs::write(
        project.join("models.json"),
        r#"{"anthropic/claude-sonnet-4": {"input": 3, "output": 15}}"#,
    )?;

    let pricing = PricingConfig {
        remote_fallback: false,
        user_file: Some(temp.path().join("user-models.json")),
        remote_cache_path: Some(temp.path().join("cache").join("models-dev.json")),
        ..Default::default()
    };
    Ok((paths, project, pricing))
}

#[test]
fn test_daily_report_buckets_by_utc_date() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let (paths, project, pricing) = seed(&temp)?;
    let loader = DataLoader::select(&paths, SourceMode::Auto)?;

    let report = load_period_report(&loader, Period::Daily, DateRange::all(), |models| {
        load_prices(&pricing, &project, models, true)
    })?;

    let labels: Vec<&str> = report.buckets.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["2023-11-14", "2023-11-15", "2023-12-14"]);
    assert!((report.buckets[1].tally.cost.amount - 1.5).abs() < 1e-9);
    assert_eq!(report.total.interactions, 3);
    assert_eq!(report.total.session_count(), 3);
    assert!((report.total.cost.amount - 7.5).abs() < 1e-9);
    assert!(report.total.cost.is_complete());
    Ok(())
}

#[test]
fn test_monthly_report_respects_range() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let (paths, project, pricing) = seed(&temp)?;
    let loader = DataLoader::select(&paths, SourceMode::Auto)?;

    let all = load_period_report(&loader, Period::Monthly, DateRange::all(), |models| {
        load_prices(&pricing, &project, models, true)
    })?;
    let labels: Vec<&str> = all.buckets.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["2023-11", "2023-12"]);
    assert_eq!(all.buckets[0].tally.session_count(), 2);

    let december = DateRange::month(2023, 12).unwrap();
    let mut priced: Vec<String> = Vec::new();
    let report = load_period_report(&loader, Period::Monthly, december, |models| {
        priced = models.iter().map(|m| m.to_string()).collect();
        load_prices(&pricing, &project, models, true)
    })?;
    assert_eq!(report.buckets.len(), 1);
    assert_eq!(report.total.interactions, 1);
    assert_eq!(priced, vec!["anthropic/claude-sonnet-4"]);
    Ok(())
}

#[test]
fn test_project_report_counts_sub_agents_with_root() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let (paths, project, pricing) = seed(&temp)?;
    let loader = DataLoader::select(&paths, SourceMode::Auto)?;

    let report = load_project_report(&loader, DateRange::all(), |models| {
        load_prices(&pricing, &project, models, true)
    })?;

    let names: Vec<&str> = report.projects.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["app", "lib"]);
    let app = &report.projects[0];
    assert_eq!(app.tally.session_count(), 2);
    assert!((app.tally.cost.amount - 4.5).abs() < 1e-9);
    assert_eq!(report.total.interactions, 3);
    Ok(())
}
