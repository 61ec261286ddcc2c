use ocmonitor_engine::*;
use ocmonitor_providers::{DataLoader, SourceMode, SourcePaths, StorageAdapter};
use ocmonitor_testing::fixtures::BASE_MS;
use ocmonitor_testing::{FileStoreFixture, MessageSpec, SqliteFixture};
use ocmonitor_types::{ModelRef, PriceEntry, PriceFields, SourceKind};
use std::collections::BTreeMap;
use tempfile::TempDir;

#[test]
fn test_relational_workflow_usage() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = SourcePaths::from_data_dir(temp.path());
    let db = SqliteFixture::create(&paths.database)?;
    db.add_project("prj_1", "/work/app")?;
    db.add_session("A", Some("prj_1"), None, BASE_MS)?;
    db.add_session("B", Some("prj_1"), Some("A"), BASE_MS + 1_000)?;
    db.add_session("C", Some("prj_1"), Some("A"), BASE_MS + 2_000)?;
    db.add_session("older", Some("prj_1"), None, BASE_MS - 60_000)?;
    db.add_message("B", &MessageSpec::assistant("m1", BASE_MS + 1_500).tokens(50, 10))?;
    db.add_message("C", &MessageSpec::assistant("m2", BASE_MS + 2_500).tokens(50, 10))?;

    let loader = DataLoader::select(&paths, SourceMode::Auto)?;
    let forest = build_forest(&loader.list_sessions()?.items);

    let workflow = forest.latest().expect("workflow");
    assert_eq!(workflow.id(), "A");
    assert_eq!(workflow.session_ids(), vec!["A", "B", "C"]);
    assert_eq!(forest.workflows.len(), 2);

    let mut records = Vec::new();
    for session in workflow.sessions() {
        records.extend(loader.list_interactions(&session.id)?.items);
    }
    let usage = WorkflowUsage::from_interactions(workflow, &records);
    assert_eq!(usage.tokens.input, 100);
    assert_eq!(usage.tokens.output, 20);
    assert_eq!(usage.session_count, 3);

    let mut prices = BTreeMap::new();
    let mut entry = PriceEntry::new("anthropic/claude-sonnet-4");
    entry.fields = PriceFields {
        input_price: Some(3.0),
        output_price: Some(15.0),
        ..Default::default()
    };
    prices.insert(
        ModelRef::new(Some("anthropic".to_string()), "claude-sonnet-4"),
        entry,
    );
    let totals = CostCalculator::new(&prices).totals(&records);
    assert!(totals.is_complete());
    assert!((totals.amount - (100.0 * 3.0 + 20.0 * 15.0) / 1_000_000.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_flat_file_orphan_becomes_root() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = SourcePaths::from_data_dir(temp.path());
    let store = FileStoreFixture::create(&paths.storage)?;
    store.add_message(&["A"], &MessageSpec::user("m1", BASE_MS))?;
    store.add_message(&["A", "B"], &MessageSpec::user("m2", BASE_MS + 1_000))?;
    store.add_message(&["archive", "X"], &MessageSpec::user("m3", BASE_MS + 5_000))?;

    let loader = DataLoader::select(&paths, SourceMode::Forced(SourceKind::FlatFile))?;
    let forest = build_forest(&loader.list_sessions()?.items);

    assert_eq!(forest.orphans, vec!["X".to_string()]);
    let roots: Vec<_> = forest.workflows.iter().map(|w| w.id()).collect();
    assert_eq!(roots, vec!["X", "A"]);
    assert_eq!(forest.get("A").map(|w| w.sub_agent_count()), Some(1));
    Ok(())
}
