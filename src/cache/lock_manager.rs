//! Per-slot mutual exclusion for cache operations.
//!
//! Acquiring a slot happens in two stages:
//!
//! 1. **In-process queue**: tasks of this process that want the same slot wait on a
//!    per-slot async mutex, so contention inside one process costs no blocking threads.
//! 2. **File lock**: the queue winner takes the slot's [`CacheLock`], which serializes
//!    against every other process on the host.
//!
//! The slot held by the running operation is recorded in a tokio task-local. That
//! record powers the implicit current-dependency API and lets the manager reject
//! reentrant and nested acquisitions instead of deadlocking.
//!
//! ```text
//! Process A: run_with_lock(github.com/x/y) ──┐
//!                                             ├── serialized: same slot
//! Process B: run_with_lock(github.com/x/y) ──┘
//!
//! Process C: run_with_lock(golang.org/x/net) ── concurrent: different slot
//! ```

use crate::cache::lock::CacheLock;
use crate::cache::paths::{CachePaths, SlotKey};
use crate::core::{CacheError, Dependency};
use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

tokio::task_local! {
    static HELD_SLOT: HeldSlot;
}

/// The slot and dependency owned by the operation running in this task.
#[derive(Debug, Clone)]
pub(crate) struct HeldSlot {
    root: PathBuf,
    slot: SlotKey,
    dependency: Dependency,
}

impl HeldSlot {
    /// Whether this is `slot` under the cache rooted at `paths`.
    pub(crate) fn is(&self, paths: &CachePaths, slot: &SlotKey) -> bool {
        self.slot == *slot && self.root == paths.root()
    }

    /// The error for requesting `slot` under `paths` while this slot is held.
    pub(crate) fn nested_error(&self, paths: &CachePaths, slot: &SlotKey) -> CacheError {
        if self.root == paths.root() {
            CacheError::NestedLock {
                held: self.slot.to_string(),
                requested: slot.to_string(),
            }
        } else {
            CacheError::NestedLock {
                held: format!("{} in {}", self.slot, self.root.display()),
                requested: format!("{} in {}", slot, paths.root().display()),
            }
        }
    }
}

/// The dependency whose lock the current task holds, if any.
///
/// Only set while an operation passed to [`LockManager::run_with_lock`] is
/// running, and only visible from that operation's own task.
#[must_use]
pub fn current_dependency() -> Option<Dependency> {
    HELD_SLOT.try_with(|held| held.dependency.clone()).ok()
}

/// The slot the current task holds, if any.
pub(crate) fn held_slot() -> Option<HeldSlot> {
    HELD_SLOT.try_with(HeldSlot::clone).ok()
}

/// A held slot: the in-process queue position plus the cross-process file lock.
#[derive(Debug)]
pub struct AcquiredLock {
    lock: CacheLock,
    _queue: OwnedMutexGuard<()>,
}

impl AcquiredLock {
    /// Release the file lock, then leave the in-process queue.
    pub fn release(self) -> Result<(), CacheError> {
        let Self { lock, _queue } = self;
        lock.release()
    }
}

/// Grants exclusive ownership of cache slots.
///
/// Clones share the same in-process queues.
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    /// One async mutex per slot key seen by this process.
    slot_queues: Arc<DashMap<String, Arc<Mutex<()>>>>,
    /// Optional bound on the total wait for a slot.
    timeout: Option<Duration>,
}

impl LockManager {
    /// Create a manager. `None` waits indefinitely.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            slot_queues: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// The configured wait bound.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Reject acquisitions that would deadlock the current task.
    ///
    /// # Errors
    ///
    /// - [`CacheError::ReentrantLock`] if this task already holds `slot` of the
    ///   same cache root
    /// - [`CacheError::NestedLock`] if this task holds any other slot, including
    ///   the same import path under another root
    pub fn check_can_acquire(&self, paths: &CachePaths, slot: &SlotKey) -> Result<(), CacheError> {
        match held_slot() {
            Some(held) if held.is(paths, slot) => Err(CacheError::ReentrantLock {
                slot: slot.to_string(),
            }),
            Some(held) => Err(held.nested_error(paths, slot)),
            None => Ok(()),
        }
    }

    /// Take exclusive ownership of `slot`.
    ///
    /// Waits indefinitely unless a timeout was configured, in which case the
    /// bound covers both the in-process queue and the file lock.
    pub async fn acquire(
        &self,
        paths: &CachePaths,
        slot: &SlotKey,
    ) -> Result<AcquiredLock, CacheError> {
        let queue = self.slot_queues.entry(slot.as_str().to_string()).or_default().clone();
        let lock_path = paths.lock_path(slot);
        let slot_name = slot.as_str();

        match self.timeout {
            None => {
                let guard = queue.lock_owned().await;
                let lock = CacheLock::acquire(&lock_path, slot_name).await?;
                Ok(AcquiredLock {
                    lock,
                    _queue: guard,
                })
            }
            Some(timeout) => {
                let start = Instant::now();
                let guard = tokio::time::timeout(timeout, queue.lock_owned()).await.map_err(
                    |_| CacheError::LockAcquisitionTimeout {
                        slot: slot_name.to_string(),
                        timeout,
                    },
                )?;
                let remaining = timeout.saturating_sub(start.elapsed());
                let lock = CacheLock::acquire_with_timeout(&lock_path, slot_name, remaining)
                    .await
                    .map_err(|e| match e {
                        CacheError::LockAcquisitionTimeout { slot, .. } => {
                            CacheError::LockAcquisitionTimeout { slot, timeout }
                        }
                        other => other,
                    })?;
                Ok(AcquiredLock {
                    lock,
                    _queue: guard,
                })
            }
        }
    }

    /// Run `operation` while holding the slot lock of `dependency`.
    ///
    /// The lock is released on every exit path: success, failure, panic and
    /// cancellation of the returned future. The operation's result or error is
    /// returned unchanged. If the operation failed and releasing the lock failed
    /// too, the operation's error is returned with the release failure attached
    /// as context, so both stay visible and the original error can still be
    /// recovered with `downcast_ref`. If only the release failed, the value is
    /// returned and the failure logged; closing the handle has dropped the OS
    /// lock regardless.
    ///
    /// # Errors
    ///
    /// Any error of `operation`, plus [`CacheError::InvalidIdentifier`],
    /// [`CacheError::ReentrantLock`], [`CacheError::NestedLock`],
    /// [`CacheError::LockAcquisition`] and [`CacheError::LockAcquisitionTimeout`].
    pub async fn run_with_lock<F, Fut, T>(
        &self,
        paths: &CachePaths,
        dependency: &Dependency,
        operation: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let slot = SlotKey::for_package(dependency.import_path())?;
        self.check_can_acquire(paths, &slot)?;
        let acquired = self.acquire(paths, &slot).await?;

        let held = HeldSlot {
            root: paths.root().to_path_buf(),
            slot: slot.clone(),
            dependency: dependency.clone(),
        };
        let outcome = HELD_SLOT.scope(held, async move { operation().await }).await;

        match (outcome, acquired.release()) {
            (outcome, Ok(())) => outcome,
            (Ok(value), Err(release_error)) => {
                warn!(slot = %slot, error = %release_error, "Cache lock release reported an error after a successful operation");
                Ok(value)
            }
            (Err(operation_error), Err(release_error)) => Err(operation_error.context(release_error)),
        }
    }
}
