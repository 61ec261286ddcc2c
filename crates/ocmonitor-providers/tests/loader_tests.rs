use ocmonitor_providers::*;
use ocmonitor_testing::fixtures::BASE_MS;
use ocmonitor_testing::{FileStoreFixture, MessageSpec, SqliteFixture};
use ocmonitor_types::SourceKind;
use tempfile::TempDir;

fn paths(temp: &TempDir) -> SourcePaths {
    SourcePaths::from_data_dir(temp.path())
}

fn seed_sqlite(paths: &SourcePaths) -> anyhow::Result<SqliteFixture> {
    let db = SqliteFixture::create(&paths.database)?;
    db.add_session("ses_db", None, None, BASE_MS)?;
    Ok(db)
}

fn seed_files(paths: &SourcePaths) -> anyhow::Result<FileStoreFixture> {
    let store = FileStoreFixture::create(&paths.storage)?;
    store.add_message(&["ses_file"], &MessageSpec::user("msg_1", BASE_MS))?;
    Ok(store)
}

#[test]
fn test_auto_prefers_database() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = paths(&temp);
    seed_sqlite(&paths)?;
    seed_files(&paths)?;

    let loader = DataLoader::select(&paths, SourceMode::Auto)?;
    assert_eq!(loader.kind(), SourceKind::Relational);
    assert_eq!(
        loader.availability(),
        Availability {
            sqlite: true,
            files: true
        }
    );

    let sessions = loader.list_sessions()?;
    assert_eq!(sessions.items[0].id, "ses_db");
    Ok(())
}

#[test]
fn test_auto_falls_back_to_files() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = paths(&temp);
    seed_files(&paths)?;

    let loader = DataLoader::select(&paths, SourceMode::Auto)?;
    assert_eq!(loader.kind(), SourceKind::FlatFile);
    assert!(!loader.sqlite_available());
    assert!(loader.files_available());

    let sessions = loader.list_sessions()?;
    assert_eq!(sessions.items[0].id, "ses_file");
    Ok(())
}

#[test]
fn test_auto_with_nothing_fails() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let err = DataLoader::select(&paths(&temp), SourceMode::Auto).unwrap_err();

    assert!(matches!(err, Error::NoSourceAvailable { .. }));
    assert!(err.to_string().starts_with("No session data source found"));
    Ok(())
}

#[test]
fn test_forced_source_unavailable_is_error() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = paths(&temp);
    seed_files(&paths)?;

    let err = DataLoader::select(&paths, SourceMode::Forced(SourceKind::Relational)).unwrap_err();
    assert!(err.is_unavailable());
    Ok(())
}

#[test]
fn test_forced_files_ignores_database() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = paths(&temp);
    seed_sqlite(&paths)?;
    seed_files(&paths)?;

    let loader = DataLoader::select(&paths, SourceMode::Forced(SourceKind::FlatFile))?;
    assert_eq!(loader.kind(), SourceKind::FlatFile);
    assert_eq!(loader.location(), paths.storage.as_path());
    Ok(())
}

#[test]
fn test_selection_is_stable_when_database_appears() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = paths(&temp);
    seed_files(&paths)?;

    let loader = DataLoader::select(&paths, SourceMode::Auto)?;
    seed_sqlite(&paths)?;

    assert!(loader.sqlite_available());
    assert_eq!(loader.kind(), SourceKind::FlatFile);
    Ok(())
}

#[test]
fn test_probe_all_reports_both() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = paths(&temp);
    assert!(!probe_all(&paths).any());

    seed_sqlite(&paths)?;
    let availability = probe_all(&paths);
    assert!(availability.sqlite);
    assert!(!availability.files);
    Ok(())
}

#[test]
fn test_both_backends_agree_on_hierarchy() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let paths = paths(&temp);

    let db = SqliteFixture::create(&paths.database)?;
    db.add_session("ses_a", None, None, BASE_MS)?;
    db.add_session("ses_b", None, Some("ses_a"), BASE_MS + 1_000)?;

    let store = FileStoreFixture::create(&paths.storage)?;
    store.add_message(&["ses_a"], &MessageSpec::user("msg_1", BASE_MS))?;
    store.add_message(&["ses_a", "ses_b"], &MessageSpec::user("msg_2", BASE_MS + 1_000))?;

    for kind in [SourceKind::Relational, SourceKind::FlatFile] {
        let loader = DataLoader::select(&paths, SourceMode::Forced(kind))?;
        let sessions = loader.list_sessions()?.items;
        let parents: Vec<_> = sessions
            .iter()
            .map(|s| (s.id.as_str(), s.parent_id.as_deref()))
            .collect();
        assert_eq!(parents, vec![("ses_a", None), ("ses_b", Some("ses_a"))], "{}", kind);
    }
    Ok(())
}
