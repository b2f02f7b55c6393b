//! File locking for cache slots.
//!
//! Each cache slot has a dedicated lock file under `<root>/.locks/`. Holding an
//! OS-level exclusive lock on that file is what grants ownership of the slot,
//! across threads and across processes. The lock belongs to the open file
//! handle, so the kernel drops it when the owning process exits or crashes.
//!
//! Lock files are never deleted. Removing a lock file while another process
//! has it open would let a third process lock a fresh inode at the same path
//! and split the slot into two lock domains.
//!
//! # Platform Considerations
//!
//! - **Unix**: `flock(2)` via [`fs4`]
//! - **Windows**: `LockFileEx` via [`fs4`]
//! - **NFS/Network**: depends on the file system's lock support

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use crate::core::CacheError;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

/// An exclusive lock on one cache slot's lock file.
///
/// Released by [`CacheLock::release`], or on drop if it was never released
/// explicitly (cancellation, panic).
#[derive(Debug)]
pub struct CacheLock {
    file: Option<Arc<File>>,
    slot: String,
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the lock, waiting as long as it takes.
    ///
    /// The blocking OS call runs on tokio's blocking pool so the runtime
    /// keeps making progress while this task waits.
    ///
    /// # Errors
    ///
    /// [`CacheError::LockAcquisition`] if the lock file cannot be opened or the
    /// file system refuses the lock.
    pub async fn acquire(lock_path: &Path, slot: &str) -> Result<Self, CacheError> {
        let file = open_lock_file(lock_path, slot).await?;
        let start = Instant::now();
        debug!(slot, "Waiting for cache lock");

        let lock_file = Arc::clone(&file);
        tokio::task::spawn_blocking(move || FileExt::lock_exclusive(&*lock_file))
            .await
            .map_err(|e| acquisition_failure(slot, std::io::Error::other(e)))?
            .map_err(|e| acquisition_failure(slot, e))?;

        debug!(slot, wait_ms = start.elapsed().as_millis(), "Cache lock acquired");
        Ok(Self {
            file: Some(file),
            slot: slot.to_string(),
            path: lock_path.to_path_buf(),
        })
    }

    /// Acquire the lock, giving up after `timeout`.
    ///
    /// Polls with a non-blocking attempt and exponential backoff (10ms up to
    /// 500ms between attempts) so an expired wait never leaves a blocked
    /// thread behind.
    ///
    /// # Errors
    ///
    /// [`CacheError::LockAcquisitionTimeout`] when the wait expires, and
    /// [`CacheError::LockAcquisition`] if the lock file cannot be opened.
    pub async fn acquire_with_timeout(
        lock_path: &Path,
        slot: &str,
        timeout: Duration,
    ) -> Result<Self, CacheError> {
        let file = open_lock_file(lock_path, slot).await?;
        let start = Instant::now();
        debug!(slot, timeout_ms = timeout.as_millis(), "Waiting for cache lock");

        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let lock_file = Arc::clone(&file);
            let attempt =
                tokio::task::spawn_blocking(move || FileExt::try_lock_exclusive(&*lock_file))
                    .await
                    .map_err(|e| acquisition_failure(slot, std::io::Error::other(e)))?;

            match attempt {
                Ok(true) => {
                    debug!(slot, wait_ms = start.elapsed().as_millis(), "Cache lock acquired");
                    return Ok(Self {
                        file: Some(file),
                        slot: slot.to_string(),
                        path: lock_path.to_path_buf(),
                    });
                }
                Ok(false) => {}
                Err(e) => return Err(acquisition_failure(slot, e)),
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(CacheError::LockAcquisitionTimeout {
            slot: slot.to_string(),
            timeout,
        })
    }

    /// The slot key this lock guards.
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// The lock file on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock and report whether the OS accepted the unlock.
    ///
    /// The file handle is closed either way, which also drops the OS lock.
    pub fn release(mut self) -> Result<(), CacheError> {
        match self.file.take() {
            Some(file) => {
                let result = FileExt::unlock(&*file);
                debug!(slot = %self.slot, "Cache lock released");
                result.map_err(|source| CacheError::LockRelease {
                    slot: self.slot.clone(),
                    source,
                })
            }
            None => Ok(()),
        }
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&*file) {
                warn!(slot = %self.slot, path = %self.path.display(), error = %e, "Failed to unlock cache lock");
            }
            debug!(slot = %self.slot, "Cache lock released on drop");
        }
    }
}

async fn open_lock_file(lock_path: &Path, slot: &str) -> Result<Arc<File>, CacheError> {
    if let Some(parent) = lock_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| acquisition_failure(slot, e))?;
    }

    let path = lock_path.to_path_buf();
    let file = tokio::task::spawn_blocking(move || {
        OpenOptions::new().create(true).read(true).write(true).truncate(false).open(&path)
    })
    .await
    .map_err(|e| acquisition_failure(slot, std::io::Error::other(e)))?
    .map_err(|e| acquisition_failure(slot, e))?;

    Ok(Arc::new(file))
}

fn acquisition_failure(slot: &str, source: std::io::Error) -> CacheError {
    CacheError::LockAcquisition {
        slot: slot.to_string(),
        source,
    }
}
