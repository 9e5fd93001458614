//! Process-safe advisory file locks for cache entries and artifacts.
//!
//! Locks are OS-level (`flock` on Unix, `LockFileEx` on Windows, via [`fs4`])
//! and tied to the open file handle, so a crashed process never leaves a lock
//! held. The lock file itself is left on disk after release.
//!
//! Two handles opened on the same path exclude each other even inside one
//! process, which is what lets threads and processes share the same protocol.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use crate::error::{TpoError, TpoResult};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

/// An exclusive lock on a lock file, released on drop
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock, polling with exponential backoff until
    /// `timeout` elapses.
    ///
    /// A zero timeout makes exactly one attempt. Parent directories of the
    /// lock file are created as needed.
    pub fn acquire(path: &Path, timeout: Duration) -> TpoResult<Self> {
        let file = open_lock_file(path)?;
        let start = Instant::now();
        let max_delay = Duration::from_millis(MAX_BACKOFF_DELAY_MS);
        let mut delays =
            ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS).max_delay(max_delay);

        loop {
            if try_lock(&file, path)? {
                debug!(
                    lock = %path.display(),
                    wait_ms = start.elapsed().as_millis() as u64,
                    "Lock acquired"
                );
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                debug!(lock = %path.display(), ?timeout, "Lock acquisition timed out");
                return Err(TpoError::LockTimeout {
                    path: path.to_path_buf(),
                    timeout,
                });
            }

            let delay = delays.next().unwrap_or(max_delay);
            thread::sleep(delay.min(remaining));
        }
    }

    /// Try once to acquire the lock; `None` if another holder has it
    pub fn try_acquire(path: &Path) -> TpoResult<Option<Self>> {
        match Self::acquire(path, Duration::ZERO) {
            Ok(lock) => Ok(Some(lock)),
            Err(TpoError::LockTimeout { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether some handle currently holds the lock at `path`.
    ///
    /// Only a snapshot: the answer may be stale by the time it is used.
    pub fn is_locked(path: &Path) -> bool {
        if !path.exists() {
            return false;
        }
        matches!(Self::try_acquire(path), Ok(None))
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly (same as dropping it)
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Closing the handle would release it as well
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

/// Run `f` while holding the lock at `path`.
///
/// The lock is released on every exit path, including when `f` returns an
/// error or panics.
pub fn with_lock<T>(
    path: &Path,
    timeout: Duration,
    f: impl FnOnce() -> TpoResult<T>,
) -> TpoResult<T> {
    let _guard = FileLock::acquire(path, timeout)?;
    f()
}

fn open_lock_file(path: &Path) -> TpoResult<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            TpoError::io(format!("creating lock directory {}", parent.display()), e)
        })?;
    }

    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| TpoError::io(format!("opening lock file {}", path.display()), e))
}

fn try_lock(file: &File, path: &Path) -> TpoResult<bool> {
    file.try_lock_exclusive()
        .map_err(|e| TpoError::io(format!("locking {}", path.display()), e))
}
