use std::fs::{self, File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::LockError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Exclusive advisory lock on `<cache>.lock`, held until dropped.
///
/// Only writers take it. Readers never wait: the cache file is replaced by
/// rename, so it is always either the old or the new complete document.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
    file: File,
}

impl CacheLock {
    /// Sidecar lock path for a cache file
    pub fn path_for(cache_path: &Path) -> PathBuf {
        let mut name = cache_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Try to take the lock until `timeout` elapses. The cache directory is
    /// created first so the lock can be taken on a fresh install.
    pub fn acquire(cache_path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = Self::path_for(cache_path);

        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| open_error(&path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| open_error(&path, e))?;

        let started = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "acquired cache lock");
                    return Ok(Self { path, file });
                }
                Err(TryLockError::WouldBlock) => {}
                Err(TryLockError::Error(e)) => return Err(open_error(&path, e)),
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(LockError::Timeout {
                    path,
                    waited_ms: waited.as_millis() as u64,
                });
            }
            thread::sleep(POLL_INTERVAL.min(timeout - waited));
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// NOTE: the lock file stays on disk
//
// - Unlinking it would let a second writer lock a fresh inode while the first
//   still holds the old one.
// - The OS drops the lock when the process dies, so a crash never leaves a
//   stuck lock behind.
impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to unlock cache lock");
            return;
        }
        tracing::debug!(path = %self.path.display(), "released cache lock");
    }
}

fn open_error(path: &Path, e: std::io::Error) -> LockError {
    LockError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
