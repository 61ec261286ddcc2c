use chrono::{DateTime, Utc};
use ocmonitor_types::{InteractionRecord, SessionRecord, SourceKind};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

use crate::message::{MessageDocument, sort_interactions};
use crate::traits::{Loaded, StorageAdapter};
use crate::{Error, Result};

// NOTE: Legacy layout (`storage/message`)
//
// - Every directory that directly holds `*.json` files is a session; the
//   directory name is the session id and each file is one message.
// - There is no parent field. A sub-agent's directory sits inside its
//   parent's directory, so the parent id is the enclosing directory's name.
// - An enclosing directory with no messages is not a known session; the
//   child keeps that parent id and the tree builder demotes it to a root.

/// Flat-file backend: one directory of JSON message files per session
#[derive(Debug)]
pub struct FileAdapter {
    root: PathBuf,
    /// Session id to directory, refreshed by every directory scan
    index: Mutex<BTreeMap<String, PathBuf>>,
}

impl Clone for FileAdapter {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            index: Mutex::new(self.index_snapshot()),
        }
    }
}

impl FileAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: Mutex::new(BTreeMap::new()),
        }
    }

    fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(Error::unavailable(
                SourceKind::FlatFile,
                format!("storage directory not found: {}", self.root.display()),
            ))
        }
    }

    fn index_snapshot(&self) -> BTreeMap<String, PathBuf> {
        self.index
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace_index(&self, index: BTreeMap<String, PathBuf>) {
        *self
            .index
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = index;
    }

    /// Directories below the root, without descending into message files.
    /// Returns the directories plus the number of entries the walk could not
    /// read.
    fn session_dirs(&self) -> (Vec<PathBuf>, usize) {
        let mut dirs = Vec::new();
        let mut unreadable = 0;
        let walk = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_type().is_dir());

        for entry in walk {
            match entry {
                Ok(entry) => dirs.push(entry.into_path()),
                Err(e) => {
                    unreadable += 1;
                    tracing::warn!(error = %e, "skipping unreadable entry in file storage");
                }
            }
        }
        (dirs, unreadable)
    }

    /// Directory of a session, rescanning the tree when the index misses or
    /// points at a directory that is gone.
    fn find_session_dir(&self, session_id: &str) -> Option<PathBuf> {
        if let Some(dir) = self.index_snapshot().get(session_id)
            && dir.is_dir()
        {
            return Some(dir.clone());
        }

        let (dirs, _) = self.session_dirs();
        let index: BTreeMap<String, PathBuf> = dirs
            .into_iter()
            .filter_map(|dir| Some((dir_name(&dir)?, dir)))
            .collect();
        let found = index.get(session_id).cloned();
        self.replace_index(index);
        found
    }

    /// Parent id from the enclosing directory, unless that is the root
    fn parent_id_for(&self, dir: &Path) -> Option<String> {
        let parent = dir.parent()?;
        if parent == self.root {
            return None;
        }
        dir_name(parent)
    }

    /// Sessions found in `dirs`. A directory that cannot be read, including
    /// one removed since the walk, is skipped and counted as malformed.
    fn load_sessions(&self, dirs: Vec<PathBuf>, mut malformed: usize) -> Loaded<SessionRecord> {
        let mut sessions = Vec::new();
        let mut index = BTreeMap::new();

        for dir in dirs {
            let files = match message_files(&dir) {
                Ok(files) => files,
                Err(e) => {
                    malformed += 1;
                    tracing::warn!(path = %dir.display(), error = %e, "skipping unreadable session directory");
                    continue;
                }
            };
            if files.is_empty() {
                continue;
            }

            let Some(id) = dir_name(&dir) else {
                malformed += 1;
                tracing::warn!(path = %dir.display(), "skipping session directory with non UTF-8 name");
                continue;
            };

            sessions.push(self.build_session(&dir, id.clone(), &files));
            index.insert(id, dir);
        }

        self.replace_index(index);
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Loaded::new(sessions, malformed)
    }

    fn build_session(&self, dir: &Path, id: String, files: &[PathBuf]) -> SessionRecord {
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut project_path = None;

        for file in files {
            let Some(doc) = read_document(file) else {
                continue;
            };
            if let Some(created) = doc.created_at() {
                earliest = Some(earliest.map_or(created, |e| e.min(created)));
            }
            if project_path.is_none() {
                project_path = doc.project_path();
            }
        }

        SessionRecord {
            id,
            parent_id: self.parent_id_for(dir),
            project_path,
            title: None,
            source: SourceKind::FlatFile,
            created_at: earliest
                .or_else(|| modified_at(dir))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

impl StorageAdapter for FileAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::FlatFile
    }

    fn location(&self) -> &Path {
        &self.root
    }

    fn probe(&self) -> bool {
        self.root.is_dir() && fs::read_dir(&self.root).is_ok()
    }

    fn list_sessions(&self) -> Result<Loaded<SessionRecord>> {
        self.ensure_root()?;

        let (dirs, unreadable) = self.session_dirs();
        let loaded = self.load_sessions(dirs, unreadable);
        tracing::debug!(
            count = loaded.len(),
            malformed = loaded.malformed,
            path = %self.root.display(),
            "loaded sessions from file storage"
        );
        Ok(loaded)
    }

    fn list_interactions(&self, session_id: &str) -> Result<Loaded<InteractionRecord>> {
        self.ensure_root()?;

        let Some(dir) = self.find_session_dir(session_id) else {
            return Ok(Loaded::empty());
        };
        let files = match message_files(&dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "cannot read session directory");
                return Ok(Loaded::new(Vec::new(), 1));
            }
        };

        let mut malformed = 0;
        let mut interactions = Vec::new();
        for file in files {
            let stem = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            let record = read_document(&file).and_then(|doc| {
                let id = doc.id.clone().filter(|id| !id.is_empty()).unwrap_or(stem);
                doc.into_interaction(id, session_id.to_string(), modified_at(&file))
            });

            match record {
                Some(record) => interactions.push(record),
                None => {
                    malformed += 1;
                    tracing::warn!(path = %file.display(), "skipping malformed message file");
                }
            }
        }

        sort_interactions(&mut interactions);
        Ok(Loaded::new(interactions, malformed))
    }
}

fn dir_name(dir: &Path) -> Option<String> {
    dir.file_name()?.to_str().map(String::from)
}

/// `*.json` files directly inside `dir`, sorted by name
fn message_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn read_document(path: &Path) -> Option<MessageDocument> {
    let content = fs::read_to_string(path).ok()?;
    MessageDocument::parse(&content).ok()
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocmonitor_testing::{FileStoreFixture, MessageSpec, fixtures::BASE_MS};
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> FileStoreFixture {
        FileStoreFixture::create(&temp.path().join("message")).unwrap()
    }

    #[test]
    fn test_probe_missing_root() {
        let temp = TempDir::new().unwrap();
        let adapter = FileAdapter::new(temp.path().join("nope"));
        assert!(!adapter.probe());
        assert!(adapter.list_sessions().unwrap_err().is_unavailable());
    }

    #[test]
    fn test_parent_reconstructed_from_nesting() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .add_message(
                &["ses_a"],
                &MessageSpec::user("msg_1", BASE_MS).project_root("/work/app"),
            )
            .unwrap();
        store
            .add_message(&["ses_a", "ses_b"], &MessageSpec::assistant("msg_2", BASE_MS + 500))
            .unwrap();

        let adapter = FileAdapter::new(store.root());
        assert!(adapter.probe());
        let loaded = adapter.list_sessions().unwrap();
        assert_eq!(loaded.len(), 2);

        let root = &loaded.items[0];
        assert_eq!(root.id, "ses_a");
        assert_eq!(root.parent_id, None);
        assert_eq!(root.project_path.as_deref(), Some("/work/app"));
        assert_eq!(root.source, SourceKind::FlatFile);

        let child = &loaded.items[1];
        assert_eq!(child.id, "ses_b");
        assert_eq!(child.parent_id.as_deref(), Some("ses_a"));
    }

    #[test]
    fn test_enclosing_directory_without_messages_is_not_a_session() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .add_message(&["group", "ses_x"], &MessageSpec::user("msg_1", BASE_MS))
            .unwrap();

        let loaded = FileAdapter::new(store.root()).list_sessions().unwrap();
        assert_eq!(loaded.len(), 1);
        // Parent id is kept; the tree builder treats it as unresolved.
        assert_eq!(loaded.items[0].parent_id.as_deref(), Some("group"));
    }

    #[test]
    fn test_list_interactions_for_nested_session() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .add_message(&["ses_a"], &MessageSpec::user("msg_1", BASE_MS))
            .unwrap();
        store
            .add_message(
                &["ses_a", "ses_b"],
                &MessageSpec::assistant("msg_3", BASE_MS + 3_000).tokens(50, 10),
            )
            .unwrap();
        store
            .add_message(
                &["ses_a", "ses_b"],
                &MessageSpec::assistant("msg_2", BASE_MS + 2_000).tokens(50, 10),
            )
            .unwrap();
        store
            .add_raw(&["ses_a", "ses_b"], "msg_bad.json", "{oops")
            .unwrap();

        let loaded = FileAdapter::new(store.root())
            .list_interactions("ses_b")
            .unwrap();

        assert_eq!(loaded.malformed, 1);
        let ids: Vec<_> = loaded.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["msg_2", "msg_3"]);
        assert!(loaded.items.iter().all(|i| i.session_id == "ses_b"));
    }

    #[test]
    fn test_vanished_session_directory_is_counted_not_fatal() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .add_message(&["ses_a"], &MessageSpec::user("msg_1", BASE_MS))
            .unwrap();

        let adapter = FileAdapter::new(store.root());
        let dirs = vec![store.root().join("ses_a"), store.root().join("ses_gone")];
        let loaded = adapter.load_sessions(dirs, 0);

        assert_eq!(loaded.malformed, 1);
        let ids: Vec<_> = loaded.items.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["ses_a"]);
    }

    #[test]
    fn test_session_moved_after_listing_is_found_again() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .add_message(&["ses_a"], &MessageSpec::user("msg_1", BASE_MS))
            .unwrap();
        store
            .add_message(&["ses_a", "ses_b"], &MessageSpec::assistant("msg_2", BASE_MS + 500))
            .unwrap();

        let adapter = FileAdapter::new(store.root());
        adapter.list_sessions().unwrap();
        assert_eq!(
            adapter.index_snapshot().get("ses_b"),
            Some(&store.root().join("ses_a").join("ses_b"))
        );

        fs::rename(store.root().join("ses_a").join("ses_b"), store.root().join("ses_b")).unwrap();
        let loaded = adapter.list_interactions("ses_b").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            adapter.index_snapshot().get("ses_b"),
            Some(&store.root().join("ses_b"))
        );
    }

    #[test]
    fn test_list_interactions_unknown_session_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let loaded = FileAdapter::new(store.root())
            .list_interactions("ses_missing")
            .unwrap();
        assert!(loaded.is_empty());
    }
}
