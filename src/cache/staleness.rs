//! Staleness markers: the fingerprint last cached for each slot.
//!
//! A marker is a small JSON document under `<root>/.markers/`. Reading one
//! tells whether a slot's content still matches what the current build asks
//! for; writing one commits a successful refresh. Writes go to a temporary
//! file in the same directory followed by a rename, so a concurrent reader
//! sees either the old marker or the new one, never a torn file.

use crate::cache::paths::{CachePaths, SlotKey};
use crate::core::{CacheError, Dependency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Persisted record of the last successful refresh of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessMarker {
    /// Normalized import path of the slot
    pub import_path: String,
    /// Fingerprint that was cached
    pub fingerprint: String,
    /// When the refresh was recorded
    pub updated_at: DateTime<Utc>,
}

impl StalenessMarker {
    /// A marker for `dependency` stamped with the current time.
    #[must_use]
    pub fn new(slot: &SlotKey, dependency: &Dependency) -> Self {
        Self {
            import_path: slot.as_str().to_string(),
            fingerprint: dependency.fingerprint().to_string(),
            updated_at: Utc::now(),
        }
    }

    /// Time elapsed since the marker was written. Clock skew counts as zero.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.updated_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Rules deciding when a matching marker is still not good enough.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Markers older than this are stale even when the fingerprint matches.
    pub cache_ttl: Option<Duration>,
    /// Ignore `cache_ttl`; nothing can be refreshed anyway.
    pub offline: bool,
    /// Treat every slot as stale.
    pub refresh_dependencies: bool,
    /// Log unreadable markers and report stale instead of failing.
    pub assume_stale_on_marker_error: bool,
}

/// Why a slot was judged stale or current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Marker present, fingerprint matches, within TTL
    UpToDate,
    /// Refresh was forced by policy
    RefreshForced,
    /// No marker on disk
    NeverCached,
    /// Marker records another fingerprint
    FingerprintChanged,
    /// Marker older than the TTL
    Expired,
    /// Marker unreadable and policy says degrade
    MarkerUnreadable,
}

impl Verdict {
    /// Whether the slot must be refreshed.
    #[must_use]
    pub const fn is_stale(self) -> bool {
        !matches!(self, Self::UpToDate)
    }

    /// Short human-readable reason.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::UpToDate => "up to date",
            Self::RefreshForced => "refresh forced",
            Self::NeverCached => "never cached",
            Self::FingerprintChanged => "fingerprint changed",
            Self::Expired => "cache entry expired",
            Self::MarkerUnreadable => "marker unreadable",
        }
    }
}

/// Reads and writes staleness markers under one cache root.
#[derive(Debug, Clone)]
pub struct StalenessTracker {
    paths: CachePaths,
    policy: StalenessPolicy,
}

impl StalenessTracker {
    /// Track markers under `paths` with `policy`.
    #[must_use]
    pub const fn new(paths: CachePaths, policy: StalenessPolicy) -> Self {
        Self { paths, policy }
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> &StalenessPolicy {
        &self.policy
    }

    /// Read the marker of `slot`. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// [`CacheError::StalenessCheck`] if the marker exists but cannot be read
    /// or is not a valid marker.
    pub async fn read_marker(&self, slot: &SlotKey) -> Result<Option<StalenessMarker>, CacheError> {
        let path = self.paths.marker_path(slot);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::StalenessCheck {
                    path,
                    source: Box::new(e),
                });
            }
        };

        let marker: StalenessMarker = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::StalenessCheck {
                path: path.clone(),
                source: Box::new(e),
            })?;

        if marker.import_path != slot.as_str() {
            return Err(CacheError::StalenessCheck {
                path,
                source: format!(
                    "marker belongs to '{}', expected '{}'",
                    marker.import_path,
                    slot.as_str()
                )
                .into(),
            });
        }
        Ok(Some(marker))
    }

    /// Judge `dependency` against its marker under the active policy.
    pub async fn verdict(&self, dependency: &Dependency) -> Result<Verdict, CacheError> {
        let slot = SlotKey::for_package(dependency.import_path())?;
        if self.policy.refresh_dependencies {
            return Ok(Verdict::RefreshForced);
        }

        let marker = match self.read_marker(&slot).await {
            Ok(marker) => marker,
            Err(e) if self.policy.assume_stale_on_marker_error => {
                warn!(slot = %slot, error = %e, "Unreadable staleness marker, assuming stale");
                return Ok(Verdict::MarkerUnreadable);
            }
            Err(e) => return Err(e),
        };

        let verdict = match marker {
            None => Verdict::NeverCached,
            Some(m) if m.fingerprint != dependency.fingerprint() => Verdict::FingerprintChanged,
            Some(m) => match self.policy.cache_ttl {
                Some(ttl) if !self.policy.offline && m.age(Utc::now()) > ttl => Verdict::Expired,
                _ => Verdict::UpToDate,
            },
        };
        debug!(slot = %slot, fingerprint = dependency.fingerprint(), ?verdict, "Staleness checked");
        Ok(verdict)
    }

    /// Whether `dependency` must be refreshed. A missing marker counts as stale.
    pub async fn is_out_of_date(&self, dependency: &Dependency) -> Result<bool, CacheError> {
        Ok(self.verdict(dependency).await?.is_stale())
    }

    /// Persist `dependency`'s fingerprint as the slot's new baseline.
    ///
    /// Callers must hold the slot lock; [`crate::cache::GlobalCache`] takes
    /// care of that.
    pub async fn write_marker(&self, dependency: &Dependency) -> Result<StalenessMarker, CacheError> {
        let slot = SlotKey::for_package(dependency.import_path())?;
        let marker = StalenessMarker::new(&slot, dependency);
        let path = self.paths.marker_path(&slot);

        let body = serde_json::to_vec_pretty(&marker).map_err(|e| CacheError::MarkerWrite {
            path: path.clone(),
            source: Box::new(e),
        })?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&target, &body))
            .await
            .map_err(|e| CacheError::MarkerWrite {
                path: path.clone(),
                source: Box::new(e),
            })?
            .map_err(|e| CacheError::MarkerWrite {
                path: path.clone(),
                source: Box::new(e),
            })?;

        debug!(slot = %slot, fingerprint = %marker.fingerprint, "Staleness marker recorded");
        Ok(marker)
    }

    /// Location of the marker for `slot`.
    #[must_use]
    pub fn marker_path(&self, slot: &SlotKey) -> PathBuf {
        self.paths.marker_path(slot)
    }
}

fn write_atomically(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(ErrorKind::InvalidInput, "marker path has no parent directory")
    })?;
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(body)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
