use ocmonitor_pricing::{PricingConfig, RemoteStatus};
use ocmonitor_providers::{DataLoader, SourceMode, SourcePaths};
use ocmonitor_runtime::*;
use ocmonitor_testing::fixtures::BASE_MS;
use ocmonitor_testing::{FileStoreFixture, MessageSpec, SqliteFixture};
use ocmonitor_types::SourceKind;
use std::fs;
use tempfile::TempDir;

fn offline_pricing(temp: &TempDir) -> PricingConfig {
    PricingConfig {
        remote_fallback: false,
        user_file: Some(temp.path().join("user-models.json")),
        remote_cache_path: Some(temp.path().join("cache").join("models-dev.json")),
        ..Default::default()
    }
}

#[test]
fn test_unpriced_model_makes_totals_incomplete() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = SourcePaths::from_data_dir(&temp.path().join("opencode"));
    let db = SqliteFixture::create(&paths.database)?;
    db.add_session("A", None, None, BASE_MS)?;
    db.add_session("B", None, Some("A"), BASE_MS + 1_000)?;
    db.add_message(
        "A",
        &MessageSpec::assistant("m1", BASE_MS + 100)
            .model("anthropic", "claude-sonnet-4")
            .tokens(1_000_000, 0),
    )?;
    db.add_message(
        "B",
        &MessageSpec::assistant("m2", BASE_MS + 1_100)
            .model("openrouter", "z-ai/glm-4.5-air")
            .tokens(500, 50),
    )?;
    db.add_raw_message("m3", "B", BASE_MS + 1_200, "{ broken")?;

    let project = temp.path().join("project");
    fs::create_dir_all(&project)?;
    fs::write(
        project.join("models.json"),
        r#"{"anthropic/claude-sonnet-4": {"input": 3, "output": 15}}"#,
    )?;

    let pricing = offline_pricing(&temp);
    let loader = DataLoader::select(&paths, SourceMode::Auto)?;
    let report = load_sessions_report(&loader, None, |models| {
        load_prices(&pricing, &project, models, false)
    })?;

    assert_eq!(report.source, SourceKind::Relational);
    assert_eq!(report.remote, RemoteStatus::Disabled);
    assert_eq!(report.workflows.len(), 1);
    assert_eq!(report.session_count(), 2);
    assert_eq!(report.malformed_interactions, 1);

    let workflow = &report.workflows[0];
    assert_eq!(workflow.usage.interactions, 2);
    assert_eq!(workflow.malformed, 1);

    assert!(!report.cost.is_complete());
    assert!((report.cost.amount - 3.0).abs() < 1e-9);
    assert_eq!(report.cost.unpriced_interactions, 1);
    assert!(report.cost.unpriced_models.contains("openrouter/z-ai/glm-4.5-air"));
    assert!(report.cost.to_string().contains("incomplete"));
    Ok(())
}

#[test]
fn test_limit_keeps_newest_workflows() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = SourcePaths::from_data_dir(temp.path());
    let store = FileStoreFixture::create(&paths.storage)?;
    for (i, id) in ["ses_1", "ses_2", "ses_3"].iter().enumerate() {
        let at = BASE_MS + i as i64 * 60_000;
        store.add_message(&[*id], &MessageSpec::assistant(&format!("m_{}", id), at).tokens(10, 1))?;
    }

    let pricing = offline_pricing(&temp);
    let loader = DataLoader::select(&paths, SourceMode::Auto)?;
    let report = load_sessions_report(&loader, Some(2), |models| {
        load_prices(&pricing, temp.path(), models, true)
    })?;

    assert_eq!(report.source, SourceKind::FlatFile);
    let roots: Vec<&str> = report.workflows.iter().map(|w| w.workflow.id()).collect();
    assert_eq!(roots, vec!["ses_3", "ses_2"]);
    assert_eq!(report.omitted, 1);
    assert_eq!(report.tokens.input, 20);
    Ok(())
}
