//! Error handling for the dependency cache
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** ([`CacheError`]) for every failure the cache itself can
//!    produce, so callers can match on them after `downcast_ref`.
//! 2. **User-friendly messages** ([`ErrorContext`]) with actionable suggestions for the
//!    command-line tool.
//!
//! Library functions return [`anyhow::Result`]. Failures that originate in the cache are
//! [`CacheError`] values wrapped in [`anyhow::Error`]; failures that originate in the
//! caller's own operation are passed through untouched.
//!
//! # Examples
//!
//! ```rust,no_run
//! use godeps_cache::core::CacheError;
//!
//! fn classify(err: &anyhow::Error) -> &'static str {
//!     match err.downcast_ref::<CacheError>() {
//!         Some(e) if e.is_retryable() => "retry later",
//!         Some(_) => "cache failure",
//!         None => "fetch failure",
//!     }
//! }
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used where a failure can come from more than one library.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure the cache itself can report.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache root (or one of its subtrees) cannot be used.
    ///
    /// Raised by root initialization when the path is not a directory, cannot be
    /// created, or is not writable by the current user.
    #[error("Cache root {} is not usable: {reason}", .path.display())]
    CacheUnwritable {
        /// The directory that failed the check
        path: PathBuf,
        /// Human-readable cause
        reason: String,
        /// Underlying I/O failure, if any
        #[source]
        source: Option<std::io::Error>,
    },

    /// An import path or binary path cannot be mapped safely into the cache.
    #[error("Invalid cache identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// The identifier as supplied by the caller
        identifier: String,
        /// Why it was rejected
        reason: String,
    },

    /// A bounded lock wait expired while another holder kept the slot.
    #[error("Timed out after {timeout:?} waiting for cache lock on '{slot}'")]
    LockAcquisitionTimeout {
        /// Slot key of the contended dependency
        slot: String,
        /// The configured wait bound
        timeout: Duration,
    },

    /// The operating system refused to open or lock the slot's lock file.
    #[error("Failed to acquire cache lock on '{slot}'")]
    LockAcquisition {
        /// Slot key of the dependency
        slot: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Releasing the slot lock failed.
    #[error("Failed to release cache lock on '{slot}'")]
    LockRelease {
        /// Slot key of the dependency
        slot: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// `run_with_lock` was called for a slot the current task already holds.
    #[error("Cache lock on '{slot}' is already held by this task; slot locks are not reentrant")]
    ReentrantLock {
        /// Slot key of the dependency
        slot: String,
    },

    /// `run_with_lock` was called for one slot while holding another.
    #[error("Cannot lock '{requested}' while holding the cache lock on '{held}'")]
    NestedLock {
        /// Slot currently held by this task
        held: String,
        /// Slot that was requested
        requested: String,
    },

    /// An implicit current-dependency call was made outside any lock scope.
    #[error("No current dependency: this call must run inside run_with_lock")]
    NoCurrentDependency,

    /// The staleness marker exists but cannot be read or parsed.
    #[error("Cannot read staleness marker {}", .path.display())]
    StalenessCheck {
        /// Marker file location
        path: PathBuf,
        /// Underlying I/O or parse failure
        #[source]
        source: BoxError,
    },

    /// The staleness marker could not be persisted.
    #[error("Cannot write staleness marker {}", .path.display())]
    MarkerWrite {
        /// Marker file location
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: BoxError,
    },
}

impl CacheError {
    /// Whether retrying the same call later can reasonably succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockAcquisitionTimeout { .. })
    }

    /// Slot key this error concerns, when it concerns exactly one.
    #[must_use]
    pub fn slot(&self) -> Option<&str> {
        match self {
            Self::LockAcquisitionTimeout { slot, .. }
            | Self::LockAcquisition { slot, .. }
            | Self::LockRelease { slot, .. }
            | Self::ReentrantLock { slot } => Some(slot),
            Self::NestedLock { requested, .. } => Some(requested),
            _ => None,
        }
    }
}

/// A user-facing rendering of an error with optional details and suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// Headline message
    pub message: String,
    /// Additional explanation
    pub details: Option<String>,
    /// What the user can do about it
    pub suggestion: Option<String>,
}

impl ErrorContext {
    /// Create a context with only a headline message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            suggestion: None,
        }
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the context to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] suitable for the terminal.
///
/// The full cause chain becomes the details; cache errors get a suggestion
/// tailored to their variant.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let causes: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    let mut ctx = ErrorContext::new(error.to_string());
    if !causes.is_empty() {
        ctx = ctx.with_details(causes.join(": "));
    }

    let cache_error = error.chain().find_map(|cause| cause.downcast_ref::<CacheError>());
    match cache_error {
        Some(CacheError::CacheUnwritable { path, .. }) => ctx.with_suggestion(format!(
            "Check that {} is a directory you own with free disk space, or point GODEPS_CACHE_DIR elsewhere",
            path.display()
        )),
        Some(CacheError::InvalidIdentifier { .. }) => ctx.with_suggestion(
            "Use a relative, slash-separated path without '..' segments or drive prefixes",
        ),
        Some(CacheError::LockAcquisitionTimeout { .. }) => ctx.with_suggestion(
            "Another build is still working on this dependency; retry, or raise lock_timeout_secs",
        ),
        Some(CacheError::ReentrantLock { .. } | CacheError::NestedLock { .. }) => ctx
            .with_suggestion("Acquire at most one dependency lock at a time per unit of work"),
        Some(CacheError::StalenessCheck { path, .. }) => ctx.with_suggestion(format!(
            "Delete {} to force a refresh, or enable assume_stale_on_marker_error",
            path.display()
        )),
        _ => ctx,
    }
}
