//! Configuration for the dependency cache.
//!
//! # Cache Location
//!
//! The cache root is resolved in this order:
//! 1. The `GODEPS_CACHE_DIR` environment variable
//! 2. `cache_dir` in the settings file
//! 3. `$GRADLE_USER_HOME/go`
//! 4. `~/.gradle/go`
//!
//! # Settings File
//!
//! Loaded from `GODEPS_CACHE_CONFIG` when set, otherwise from
//! `<build tool home>/godeps-cache.toml`. A missing file means defaults.
//!
//! ```toml
//! cache_dir = "~/.gradle/go"
//! lock_timeout_secs = 600
//! cache_ttl_secs = 86400
//! offline = false
//! refresh_dependencies = false
//! assume_stale_on_marker_error = false
//! ```

mod settings;

pub use settings::CacheSettings;

use crate::constants::{BUILD_HOME_ENV, CACHE_DIR_ENV};
use anyhow::Result;
use std::path::PathBuf;

/// The build tool's home directory: `$GRADLE_USER_HOME`, else `~/.gradle`.
pub fn get_build_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(BUILD_HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
        .join(".gradle"))
}

/// Default cache root, honoring the `GODEPS_CACHE_DIR` override.
///
/// Nothing is created here; see [`crate::cache::GlobalCache::ensure_cache_root_ready`].
pub fn get_cache_dir() -> Result<PathBuf> {
    if let Some(dir) = cache_dir_override() {
        return Ok(dir);
    }
    Ok(get_build_home()?.join("go"))
}

pub(crate) fn cache_dir_override() -> Option<PathBuf> {
    std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()).map(PathBuf::from)
}
