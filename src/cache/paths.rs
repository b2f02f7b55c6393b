//! Mapping of logical identifiers to locations under the cache root.
//!
//! Everything here is pure path composition: no function touches the
//! filesystem. Identifiers are normalized before use so that logically equal
//! import paths always land in the same directory, whatever separator style
//! the caller's host uses, and so that no identifier can escape its subtree.
//!
//! Uppercase ASCII letters are stored as `!` followed by the lowercase letter
//! (`Sirupsen` becomes `!sirupsen`), so identifiers that differ only in case
//! stay distinct on case-insensitive filesystems. `!` itself is therefore
//! not accepted in identifiers.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── gopath/<import path>/          dependency sources
//! ├── binary/<relative path>         cached binaries
//! ├── .locks/<slot stem>.lock        one lock file per slot
//! └── .markers/<slot stem>.json      one staleness marker per slot
//! ```

use crate::constants::{
    BINARY_DIR, GOPATH_DIR, LOCK_FILE_EXTENSION, LOCKS_DIR, MARKER_FILE_EXTENSION, MARKERS_DIR,
    SLOT_HASH_LEN, SLOT_LABEL_MAX_LEN,
};
use crate::core::CacheError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Normalize a slash- or backslash-separated identifier into its segments.
///
/// Empty and `.` segments are dropped. The identifier is rejected when it is
/// empty, absolute, contains a `..` segment, contains drive or scheme syntax
/// (`:`), contains control characters, or has no segments left. Segments
/// that Windows would not store as plain files are rejected too: reserved
/// device names (`NUL`, `com1.txt`) and names ending in a dot or a space.
///
/// ```rust
/// use godeps_cache::cache::paths::normalize_identifier;
///
/// assert_eq!(
///     normalize_identifier(r"github.com\x\.\y/").unwrap(),
///     vec!["github.com", "x", "y"]
/// );
/// assert!(normalize_identifier("../etc/passwd").is_err());
/// assert!(normalize_identifier("C:/Windows").is_err());
/// assert!(normalize_identifier("binary/NUL").is_err());
/// ```
pub fn normalize_identifier(identifier: &str) -> Result<Vec<&str>, CacheError> {
    let invalid = |reason: &str| CacheError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    };

    if identifier.is_empty() {
        return Err(invalid("identifier is empty"));
    }
    if identifier.starts_with('/') || identifier.starts_with('\\') {
        return Err(invalid("absolute paths are not allowed"));
    }

    let mut segments = Vec::new();
    for segment in identifier.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid("parent directory segments ('..') are not allowed")),
            _ => {}
        }
        if segment.contains(':') {
            return Err(invalid("drive, volume or scheme syntax (':') is not allowed"));
        }
        if segment.chars().any(char::is_control) {
            return Err(invalid("control characters are not allowed"));
        }
        if segment.contains('!') {
            return Err(invalid("'!' is reserved for case escaping"));
        }
        if segment.chars().any(|c| !c.is_ascii() && (c.is_uppercase() || c.is_lowercase())) {
            return Err(invalid("letters outside ASCII are not allowed"));
        }
        if segment.ends_with('.') || segment.ends_with(' ') {
            return Err(invalid("segments may not end with a dot or a space"));
        }
        if is_reserved_device_name(segment) {
            return Err(invalid("reserved device names are not allowed"));
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(invalid("identifier has no path segments"));
    }
    Ok(segments)
}

/// Windows device names are reserved in every directory and with any extension.
fn is_reserved_device_name(segment: &str) -> bool {
    const RESERVED_NAMES: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    let base = segment.split('.').next().unwrap_or(segment).trim_end();
    RESERVED_NAMES.contains(&base.to_ascii_uppercase().as_str())
}

/// Store each uppercase ASCII letter as `!` plus its lowercase form.
fn escape_case(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

fn escaped_segments(identifier: &str) -> Result<Vec<String>, CacheError> {
    Ok(normalize_identifier(identifier)?.into_iter().map(escape_case).collect())
}

/// The identity of one dependency's cache slot.
///
/// Built from the normalized import path and independent of the fingerprint,
/// so every version of a package shares one slot, one lock and one marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    key: String,
}

impl SlotKey {
    /// Derive the slot key for a package import path.
    pub fn for_package(import_path: &str) -> Result<Self, CacheError> {
        Ok(Self {
            key: escaped_segments(import_path)?.join("/"),
        })
    }

    /// The normalized, case-escaped import path, always `/`-separated.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// File stem shared by this slot's lock file and marker.
    ///
    /// A readable label from the last path segment followed by a hash of the
    /// full key, so distinct slots never share bookkeeping files.
    #[must_use]
    pub fn file_stem(&self) -> String {
        let digest = Sha256::digest(format!("{GOPATH_DIR}/{}", self.key).as_bytes());
        let hash = hex::encode(digest);
        let last = self.key.rsplit('/').next().unwrap_or(&self.key);
        let label: String = last
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .take(SLOT_LABEL_MAX_LEN)
            .collect();
        format!("{label}-{}", &hash[..SLOT_HASH_LEN])
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Path composition rooted at one cache directory.
#[derive(Debug, Clone)]
pub struct CachePaths {
    root: PathBuf,
}

impl CachePaths {
    /// Compose paths under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/gopath`
    #[must_use]
    pub fn gopath_dir(&self) -> PathBuf {
        self.root.join(GOPATH_DIR)
    }

    /// `<root>/binary`
    #[must_use]
    pub fn binary_dir(&self) -> PathBuf {
        self.root.join(BINARY_DIR)
    }

    /// `<root>/.locks`
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(LOCKS_DIR)
    }

    /// `<root>/.markers`
    #[must_use]
    pub fn markers_dir(&self) -> PathBuf {
        self.root.join(MARKERS_DIR)
    }

    /// Directory holding the sources of `package_path`.
    pub fn package_path(&self, package_path: &str) -> Result<PathBuf, CacheError> {
        Ok(join_segments(self.gopath_dir(), &escaped_segments(package_path)?))
    }

    /// Location of the cached binary at `relative_path`.
    pub fn binary_path(&self, relative_path: &str) -> Result<PathBuf, CacheError> {
        Ok(join_segments(self.binary_dir(), &escaped_segments(relative_path)?))
    }

    /// Directory of an already-validated slot.
    #[must_use]
    pub fn slot_dir(&self, slot: &SlotKey) -> PathBuf {
        join_segments(self.gopath_dir(), slot.key.split('/'))
    }

    /// Lock file guarding `slot`.
    #[must_use]
    pub fn lock_path(&self, slot: &SlotKey) -> PathBuf {
        self.locks_dir().join(format!("{}.{LOCK_FILE_EXTENSION}", slot.file_stem()))
    }

    /// Staleness marker of `slot`.
    #[must_use]
    pub fn marker_path(&self, slot: &SlotKey) -> PathBuf {
        self.markers_dir().join(format!("{}.{MARKER_FILE_EXTENSION}", slot.file_stem()))
    }
}

fn join_segments<S: AsRef<Path>>(mut base: PathBuf, segments: impl IntoIterator<Item = S>) -> PathBuf {
    for segment in segments {
        base.push(segment);
    }
    base
}
