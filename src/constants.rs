//! Global constants used throughout the cache.
//!
//! Directory names, file extensions and retry parameters that several
//! modules need to agree on live here.

/// Subtree holding one directory per package import path.
pub const GOPATH_DIR: &str = "gopath";

/// Subtree holding cached built binaries.
pub const BINARY_DIR: &str = "binary";

/// Bookkeeping directory holding one lock file per cache slot.
pub const LOCKS_DIR: &str = ".locks";

/// Bookkeeping directory holding one staleness marker per cache slot.
pub const MARKERS_DIR: &str = ".markers";

/// Extension of per-slot lock files.
pub const LOCK_FILE_EXTENSION: &str = "lock";

/// Extension of per-slot staleness markers.
pub const MARKER_FILE_EXTENSION: &str = "json";

/// Number of hex characters of the slot hash kept in lock and marker file names.
pub const SLOT_HASH_LEN: usize = 16;

/// Maximum length of the readable prefix in lock and marker file names.
pub const SLOT_LABEL_MAX_LEN: usize = 48;

/// Prefix for the probe files used to verify that the cache root is writable.
pub const WRITE_PROBE_PREFIX: &str = ".write-probe-";

/// Maximum delay between lock attempts when a bounded wait is configured (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay between lock attempts when a bounded wait is configured (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Environment variable overriding the cache root location.
pub const CACHE_DIR_ENV: &str = "GODEPS_CACHE_DIR";

/// Environment variable overriding the settings file location.
pub const CONFIG_PATH_ENV: &str = "GODEPS_CACHE_CONFIG";

/// Environment variable naming the build tool's home directory.
pub const BUILD_HOME_ENV: &str = "GRADLE_USER_HOME";

/// Settings file name inside the build tool's home directory.
pub const CONFIG_FILE_NAME: &str = "godeps-cache.toml";

/// Environment variable exported to `exec` commands: the dependency's source directory.
pub const EXEC_PACKAGE_DIR_ENV: &str = "GODEPS_CACHE_PACKAGE_DIR";

/// Environment variable exported to `exec` commands: the dependency's fingerprint.
pub const EXEC_FINGERPRINT_ENV: &str = "GODEPS_CACHE_FINGERPRINT";
