//! Global dependency cache shared by every build on the machine
//!
//! One cache root holds fetched dependency sources and built binaries for all
//! projects and all concurrent build processes of the current user. This module
//! ties together the four pieces that make sharing safe:
//!
//! - [`paths`]: deterministic, traversal-proof mapping of identifiers to locations
//! - [`root`]: idempotent creation and verification of the root tree
//! - [`lock_manager`] and [`lock`]: per-dependency mutual exclusion, in-process
//!   and across processes
//! - [`staleness`]: persisted fingerprints deciding whether a slot needs a refresh
//!
//! [`GlobalCache`] is the facade over all of them.
//!
//! # Cache Directory Structure
//!
//! ```text
//! ~/.gradle/go/
//! ├── gopath/                      # Dependency sources, one dir per import path
//! │   └── github.com/x/y/
//! ├── binary/                      # Cached built binaries
//! ├── .locks/                      # One lock file per slot, never deleted
//! │   └── y-3f1c9a0b2d4e6f81.lock
//! └── .markers/                    # One staleness marker per slot
//!     └── y-3f1c9a0b2d4e6f81.json
//! ```
//!
//! # Locking Strategy
//!
//! A *slot* is the cache entry of one import path, independent of version. Every
//! mutation of a slot (its directory and its marker) happens inside
//! [`GlobalCache::run_with_lock`] for that slot.
//!
//! ```text
//! Build A: run_with_lock(github.com/x/y@v1) ──┐
//!                                              ├── BLOCKS: same slot
//! Build B: run_with_lock(github.com/x/y@v2) ──┘
//!
//! Build C: run_with_lock(golang.org/x/net) ──── CONCURRENT: different slot
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use godeps_cache::cache::GlobalCache;
//! use godeps_cache::core::Dependency;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = GlobalCache::new().await?;
//! cache.ensure_cache_root_ready().await?;
//!
//! let dep = Dependency::new("github.com/x/y", "v1.0");
//! let dir = cache.resolve_package_path(dep.import_path())?;
//!
//! cache
//!     .run_with_lock(&dep, || async {
//!         if cache.current_dependency_is_out_of_date().await? {
//!             // fetch sources into `dir` here
//!             tokio::fs::create_dir_all(&dir).await?;
//!             cache.update_current_dependency_lock().await?;
//!         }
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod lock;
pub mod lock_manager;
pub mod paths;
pub mod root;
pub mod staleness;

pub use lock_manager::current_dependency;

use crate::config::CacheSettings;
use crate::core::{CacheError, Dependency};
use anyhow::{Context, Result};
use lock_manager::{LockManager, held_slot};
use paths::{CachePaths, SlotKey};
use staleness::{StalenessMarker, StalenessTracker, Verdict};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Handle to the global dependency cache.
///
/// Cheap to clone; clones share the in-process lock queues, so tasks of one
/// process should use clones of a single instance.
#[derive(Debug, Clone)]
pub struct GlobalCache {
    paths: CachePaths,
    locks: LockManager,
    staleness: StalenessTracker,
}

impl GlobalCache {
    /// Open the cache described by the user's settings file.
    ///
    /// The root comes from `GODEPS_CACHE_DIR`, then the settings file, then
    /// the build tool home. Nothing is created on disk; call
    /// [`Self::ensure_cache_root_ready`] before use.
    ///
    /// # Errors
    ///
    /// Fails when the settings file exists but cannot be parsed, or when no
    /// home directory can be determined.
    pub async fn new() -> Result<Self> {
        let settings = CacheSettings::load().await?;
        Self::from_settings(&settings)
    }

    /// Open the cache described by `settings`, resolving the root the same way
    /// as [`Self::new`].
    pub fn from_settings(settings: &CacheSettings) -> Result<Self> {
        let dir = settings.resolve_cache_dir().context("Failed to determine cache directory")?;
        Ok(Self::with_settings(dir, settings))
    }

    /// A cache at `dir` with default settings: unbounded lock waits, no TTL.
    #[must_use]
    pub fn with_dir(dir: PathBuf) -> Self {
        Self::with_settings(dir, &CacheSettings::default())
    }

    /// A cache at `dir` with the lock timeout and staleness policy of
    /// `settings`. `settings.cache_dir` is not consulted.
    #[must_use]
    pub fn with_settings(dir: PathBuf, settings: &CacheSettings) -> Self {
        let paths = CachePaths::new(dir);
        Self {
            locks: LockManager::new(settings.lock_timeout()),
            staleness: StalenessTracker::new(paths.clone(), settings.staleness_policy()),
            paths,
        }
    }

    /// The cache root directory.
    #[must_use]
    pub fn cache_root(&self) -> &Path {
        self.paths.root()
    }

    /// Layout of the cache root.
    #[must_use]
    pub const fn paths(&self) -> &CachePaths {
        &self.paths
    }

    /// Bound on lock waits, if one is configured.
    #[must_use]
    pub const fn lock_timeout(&self) -> Option<Duration> {
        self.locks.timeout()
    }

    /// Create the cache root and its subtrees if needed and verify they are
    /// writable directories.
    ///
    /// Idempotent, and safe to call concurrently from any number of tasks and
    /// processes.
    ///
    /// # Errors
    ///
    /// [`CacheError::CacheUnwritable`] when the root or a subtree is not a
    /// directory, cannot be created, or rejects writes.
    pub async fn ensure_cache_root_ready(&self) -> Result<()> {
        root::ensure_ready(&self.paths).await?;
        Ok(())
    }

    /// Directory under `gopath/` holding the sources of `package_path`.
    ///
    /// Pure path computation. Logically equal import paths map to the same
    /// directory regardless of separator style.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidIdentifier`] for empty, absolute or traversing
    /// identifiers.
    pub fn resolve_package_path(&self, package_path: &str) -> Result<PathBuf> {
        Ok(self.paths.package_path(package_path)?)
    }

    /// Location under `binary/` of the cached binary at `relative_path`.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidIdentifier`] under the same rules as
    /// [`Self::resolve_package_path`].
    pub fn resolve_binary_path(&self, relative_path: &str) -> Result<PathBuf> {
        Ok(self.paths.binary_path(relative_path)?)
    }

    /// Run `operation` while exclusively owning the slot of `dependency`.
    ///
    /// Blocks other tasks and other processes that ask for the same slot until
    /// `operation` finishes. Distinct slots never block each other. The lock is
    /// released whatever the outcome, and the operation's error is returned
    /// unchanged. While `operation` runs, `dependency` is the task's current
    /// dependency (see [`current_dependency`]).
    ///
    /// Slot locks are neither reentrant nor nestable: locking any slot from
    /// inside `operation` fails with [`CacheError::ReentrantLock`] or
    /// [`CacheError::NestedLock`]. Only the task running `operation` is
    /// covered; tasks it spawns do not inherit the held slot.
    pub async fn run_with_lock<F, Fut, T>(&self, dependency: &Dependency, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.locks.run_with_lock(&self.paths, dependency, operation).await
    }

    /// Whether the cached content of `dependency`'s slot must be refreshed.
    ///
    /// `true` when no marker exists, when the marker records a different
    /// fingerprint, when the marker outlived the configured TTL (unless
    /// offline), or when refreshes are forced. Read-only.
    ///
    /// # Errors
    ///
    /// [`CacheError::StalenessCheck`] when the marker exists but is unreadable,
    /// unless `assume_stale_on_marker_error` is set.
    pub async fn is_out_of_date(&self, dependency: &Dependency) -> Result<bool> {
        Ok(self.staleness.is_out_of_date(dependency).await?)
    }

    /// The reason behind [`Self::is_out_of_date`]'s answer.
    pub async fn verdict(&self, dependency: &Dependency) -> Result<Verdict> {
        Ok(self.staleness.verdict(dependency).await?)
    }

    /// The stored marker of `import_path`'s slot, if any.
    pub async fn marker(&self, import_path: &str) -> Result<Option<StalenessMarker>> {
        let slot = SlotKey::for_package(import_path)?;
        Ok(self.staleness.read_marker(&slot).await?)
    }

    /// Record `dependency`'s fingerprint as the slot's cached state.
    ///
    /// Inside [`Self::run_with_lock`] for the same slot of this cache root the
    /// marker is written directly. Outside any lock the slot lock is taken for
    /// the write.
    ///
    /// # Errors
    ///
    /// [`CacheError::NestedLock`] when called while holding another slot, and
    /// [`CacheError::MarkerWrite`] when the marker cannot be persisted.
    pub async fn record_up_to_date(&self, dependency: &Dependency) -> Result<()> {
        let slot = SlotKey::for_package(dependency.import_path())?;
        match held_slot() {
            Some(held) if held.is(&self.paths, &slot) => {
                self.staleness.write_marker(dependency).await?;
                Ok(())
            }
            Some(held) => Err(held.nested_error(&self.paths, &slot).into()),
            None => {
                self.run_with_lock(dependency, || async {
                    self.staleness.write_marker(dependency).await?;
                    Ok(())
                })
                .await
            }
        }
    }

    /// [`Self::is_out_of_date`] for the dependency whose lock this task holds.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoCurrentDependency`] outside [`Self::run_with_lock`].
    pub async fn current_dependency_is_out_of_date(&self) -> Result<bool> {
        let dependency = current_dependency().ok_or(CacheError::NoCurrentDependency)?;
        self.is_out_of_date(&dependency).await
    }

    /// [`Self::record_up_to_date`] for the dependency whose lock this task holds.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoCurrentDependency`] outside [`Self::run_with_lock`].
    pub async fn update_current_dependency_lock(&self) -> Result<()> {
        let dependency = current_dependency().ok_or(CacheError::NoCurrentDependency)?;
        self.record_up_to_date(&dependency).await
    }
}
