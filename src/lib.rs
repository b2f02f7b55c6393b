//! godeps-cache - global dependency cache for Go builds
//!
//! A single cache root per user holds fetched dependency sources and built
//! binaries for every project on the machine. Many build processes use it at
//! the same time, so every piece of the cache is designed for sharing:
//!
//! - Paths are derived deterministically from import paths and can never
//!   escape the cache root.
//! - The root is created idempotently; racing processes both succeed.
//! - Each dependency slot has its own cross-process lock. Builds touching
//!   different dependencies never wait for each other.
//! - A persisted fingerprint per slot tells a build whether it must refresh.
//!
//! # Core Modules
//!
//! - [`cache`] - The [`cache::GlobalCache`] facade and its components
//! - [`config`] - Cache location and user settings
//! - [`core`] - Dependency descriptor and error types
//! - [`cli`] - The `godeps-cache` maintenance command
//! - [`constants`] - Layout names and tuning values
//!
//! # Example
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
//! cache
//!     .run_with_lock(&dep, || async {
//!         if cache.is_out_of_date(&dep).await? {
//!             let _target = cache.resolve_package_path(dep.import_path())?;
//!             // fetch into `_target`
//!             cache.record_up_to_date(&dep).await?;
//!         }
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Settings (`godeps-cache.toml`)
//!
//! ```toml
//! cache_dir = "~/.gradle/go"
//! lock_timeout_secs = 600
//! cache_ttl_secs = 86400
//! offline = false
//! refresh_dependencies = false
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
