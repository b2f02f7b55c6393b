//! Test utilities for the dependency cache
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`init_test_logging`] wires `tracing` into the test harness output
//! - [`EnvGuard`] sets an environment variable and restores it on drop
//! - [`TestCache`] is a [`GlobalCache`] rooted in a private temporary directory
//!
//! Tests that touch environment variables must also be marked
//! `#[serial_test::serial]`; the process environment is shared by every test
//! thread.
//!
//! # Example
//!
//! ```rust,no_run
//! use godeps_cache::test_utils::TestCache;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let cache = TestCache::new().await?;
//! let dir = cache.resolve_package_path("github.com/x/y")?;
//! assert!(dir.starts_with(cache.root()));
//! # Ok(())
//! # }
//! ```

use crate::cache::GlobalCache;
use crate::config::CacheSettings;
use anyhow::Result;
use std::ffi::OsString;
use std::ops::Deref;
use std::path::Path;
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=godeps_cache=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Sets (or removes) an environment variable and restores the previous value
/// when dropped.
pub struct EnvGuard {
    key: &'static str,
    previous: Option<OsString>,
}

impl EnvGuard {
    /// Set `key` to `value`, or remove it when `value` is `None`.
    pub fn set(key: &'static str, value: Option<&str>) -> Self {
        let previous = std::env::var_os(key);
        // SAFETY: callers serialize environment access with `#[serial]`.
        unsafe {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
        Self { key, previous }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see `EnvGuard::set`.
        unsafe {
            match &self.previous {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }
}

/// A ready-to-use cache rooted in a temporary directory that is deleted on drop.
pub struct TestCache {
    cache: GlobalCache,
    _temp: TempDir,
}

impl TestCache {
    /// A cache with default settings, initialized on disk.
    pub async fn new() -> Result<Self> {
        Self::with_settings(&CacheSettings::default()).await
    }

    /// A cache with `settings`, initialized on disk. `settings.cache_dir` is
    /// ignored; the root is always the temporary directory.
    pub async fn with_settings(settings: &CacheSettings) -> Result<Self> {
        init_test_logging(None);
        let temp = TempDir::new()?;
        let cache = GlobalCache::with_settings(temp.path().join("go"), settings);
        cache.ensure_cache_root_ready().await?;
        Ok(Self {
            cache,
            _temp: temp,
        })
    }

    /// The cache root.
    pub fn root(&self) -> &Path {
        self.cache.cache_root()
    }

    /// A clone of the underlying cache, for moving into spawned tasks.
    pub fn handle(&self) -> GlobalCache {
        self.cache.clone()
    }
}

impl Deref for TestCache {
    type Target = GlobalCache;

    fn deref(&self) -> &GlobalCache {
        &self.cache
    }
}
