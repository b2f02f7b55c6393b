//! The dependency descriptor supplied by the resolver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved third-party package: its import path and the fingerprint
/// (version, commit or content hash) the current build wants.
///
/// Values are immutable once built. The import path decides the cache slot
/// and lock; the fingerprint is only compared against the staleness marker.
///
/// ```rust
/// use godeps_cache::core::Dependency;
///
/// let dep = Dependency::new("github.com/x/y", "v1.0");
/// assert_eq!(dep.import_path(), "github.com/x/y");
/// assert_eq!(dep.to_string(), "github.com/x/y@v1.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    import_path: String,
    fingerprint: String,
}

impl Dependency {
    /// Create a dependency descriptor.
    pub fn new(import_path: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// The package import path, e.g. `github.com/x/y`.
    #[must_use]
    pub fn import_path(&self) -> &str {
        &self.import_path
    }

    /// The opaque resolved-state token.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The same package at a different fingerprint.
    #[must_use]
    pub fn with_fingerprint(&self, fingerprint: impl Into<String>) -> Self {
        Self::new(self.import_path.clone(), fingerprint)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.import_path, self.fingerprint)
    }
}
