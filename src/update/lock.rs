//! Cross-process update lock.
//!
//! Two update runs racing on the same installation would interleave git
//! operations and global installs. Before the first mutating step the engine
//! takes an exclusive OS-level lock on `<state-dir>/update.lock`; a second run
//! gives up after a short timeout with [`UpdateError::LockHeld`].
//!
//! # Async Safety
//!
//! File operations are wrapped in `spawn_blocking` so lock polling never
//! blocks a runtime worker.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use crate::core::UpdateError;

/// Lock file name inside the state directory.
pub const UPDATE_LOCK_FILE: &str = "update.lock";

/// Exclusive lock held for the duration of one update run.
///
/// The OS lock is released when this value is dropped. The file itself is left
/// in place; removing it would let a third process lock a fresh inode while a
/// second one still holds the old one.
#[derive(Debug)]
pub struct UpdateLock {
    _file: Arc<File>,
    path: PathBuf,
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        debug!(target: "lock", "Update lock released: {}", self.path.display());
    }
}

/// Delays between lock attempts: 10ms, 20ms, 40ms... capped at 500ms.
///
/// `ExponentialBackoff` yields `factor * base^n`, so doubling needs base 2
/// with the starting delay folded into the factor.
fn lock_backoff() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor(STARTING_BACKOFF_DELAY_MS / 2)
        .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS))
}

impl UpdateLock {
    /// Acquire the lock in `state_dir`, waiting at most `timeout`.
    ///
    /// Polls with `try_lock_exclusive()`, doubling the delay between attempts.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::LockHeld`] when another run holds the lock past `timeout`
    /// - I/O errors creating the state directory or lock file
    pub async fn acquire(state_dir: &Path, timeout: Duration) -> Result<Self> {
        tokio::fs::create_dir_all(state_dir).await.with_context(|| {
            format!("Failed to create state directory: {}", state_dir.display())
        })?;

        let path = state_dir.join(UPDATE_LOCK_FILE);
        debug!(target: "lock", "Waiting for update lock: {}", path.display());

        let open_path = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .context("spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", path.display()))?;
        let file = Arc::new(file);

        let start = Instant::now();
        for delay in lock_backoff() {
            let attempt = Arc::clone(&file);
            let locked = tokio::task::spawn_blocking(move || attempt.try_lock_exclusive())
                .await
                .context("spawn_blocking panicked")?;

            if let Ok(true) = locked {
                debug!(
                    target: "lock",
                    "Update lock acquired after {}ms",
                    start.elapsed().as_millis()
                );
                return Ok(Self {
                    _file: file,
                    path,
                });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(UpdateError::LockHeld {
            path,
        }
        .into())
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
