//! TestWorld pattern for declarative integration test setup.
//!
//! Provides a fluent interface for:
//! - Creating an isolated OpenCode data directory
//! - Populating the SQLite database and/or legacy file store
//! - Executing CLI commands with HOME/XDG redirected into the sandbox

use anyhow::Result;
use assert_cmd::Command;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::fixtures::{FileStoreFixture, SqliteFixture};

/// Declarative test environment builder.
///
/// # Example
/// ```no_run
/// use ocmonitor_testing::TestWorld;
///
/// let world = TestWorld::new();
/// let db = world.sqlite().unwrap();
/// db.add_session("ses_a", None, None, 1_700_000_000_000).unwrap();
///
/// let result = world.run(&["sessions", "--no-remote"]).unwrap();
/// assert!(result.success());
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
    cwd: PathBuf,
    data_dir: PathBuf,
    env_vars: HashMap<String, String>,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Create a new isolated test environment.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_path = temp_dir.path().to_path_buf();
        let data_dir = base_path.join("opencode");
        let cwd = base_path.join("workspace");

        std::fs::create_dir_all(&data_dir).expect("Failed to create data dir");
        std::fs::create_dir_all(&cwd).expect("Failed to create workspace dir");

        Self {
            cwd,
            temp_dir,
            data_dir,
            env_vars: HashMap::new(),
        }
    }

    /// OpenCode data directory (holds `opencode.db` and `storage/`).
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("opencode.db")
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join("storage").join("message")
    }

    /// Current working directory for CLI runs (project-local `models.json` lives here).
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Open (creating if needed) the SQLite backend.
    pub fn sqlite(&self) -> Result<SqliteFixture> {
        SqliteFixture::create(&self.database_path())
    }

    /// Open (creating if needed) the legacy file store.
    pub fn files(&self) -> Result<FileStoreFixture> {
        FileStoreFixture::create(&self.storage_path())
    }

    /// Write a project-local `models.json` into the working directory.
    pub fn with_project_prices(self, json: &str) -> Self {
        std::fs::write(self.cwd.join("models.json"), json).expect("Failed to write models.json");
        self
    }

    /// Set an environment variable for CLI execution.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Configure a CLI command with this test environment's settings.
    pub fn configure_command<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        let root = self.temp_dir.path();
        cmd.current_dir(&self.cwd)
            .env("OPENCODE_DATA_DIR", &self.data_dir)
            .env("HOME", root)
            .env("XDG_CONFIG_HOME", root.join("config"))
            .env("XDG_CACHE_HOME", root.join("cache"))
            .env_remove("RUST_LOG");

        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        cmd
    }

    /// Execute the `ocmonitor` binary and capture its output.
    #[allow(deprecated)]
    pub fn run(&self, args: &[&str]) -> Result<CliResult> {
        let mut cmd = Command::cargo_bin("ocmonitor")
            .map_err(|e| anyhow::anyhow!("Failed to find ocmonitor binary: {}", e))?;

        self.configure_command(&mut cmd);
        cmd.args(args);

        let output = cmd.output()?;

        Ok(CliResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Result of a CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CliResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }
}
