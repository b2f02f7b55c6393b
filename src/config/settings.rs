//! User settings for the cache, stored as TOML.

use crate::cache::staleness::StalenessPolicy;
use crate::config::{cache_dir_override, get_build_home, get_cache_dir};
use crate::constants::{CONFIG_FILE_NAME, CONFIG_PATH_ENV};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Settings shared by every build that uses the cache.
///
/// Every field is optional in the file; absent fields take the defaults
/// below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache root. `~` is expanded. Overridden by `GODEPS_CACHE_DIR`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Upper bound on waiting for a slot lock. Absent means wait indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_timeout_secs: Option<u64>,

    /// How long a matching marker stays fresh. Absent means forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,

    /// Ignore `cache_ttl_secs`.
    pub offline: bool,

    /// Report every slot as stale.
    pub refresh_dependencies: bool,

    /// Treat unreadable markers as stale instead of failing.
    pub assume_stale_on_marker_error: bool,
}

impl CacheSettings {
    /// Location of the settings file: `GODEPS_CACHE_CONFIG`, else
    /// `<build tool home>/godeps-cache.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        Ok(get_build_home()?.join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, or defaults if there is no file.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, else from the default location. A
    /// missing file yields defaults; a path that cannot be inspected is an
    /// error, so configured settings are never dropped silently.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        let exists = fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to access cache settings at {}", path.display()))?;
        if exists {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from `path`, which must exist.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read cache settings from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse cache settings from {}", path.display()))
    }

    /// Write the settings to `path`, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize cache settings")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write cache settings to {}", path.display()))
    }

    /// The effective cache root.
    pub fn resolve_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = cache_dir_override() {
            return Ok(dir);
        }
        match &self.cache_dir {
            Some(dir) => Ok(PathBuf::from(shellexpand::tilde(dir).into_owned())),
            None => get_cache_dir(),
        }
    }

    /// The configured lock wait bound.
    #[must_use]
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_secs.map(Duration::from_secs)
    }

    /// The staleness rules these settings describe.
    #[must_use]
    pub fn staleness_policy(&self) -> StalenessPolicy {
        StalenessPolicy {
            cache_ttl: self.cache_ttl_secs.map(Duration::from_secs),
            offline: self.offline,
            refresh_dependencies: self.refresh_dependencies,
            assume_stale_on_marker_error: self.assume_stale_on_marker_error,
        }
    }
}
