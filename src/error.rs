//! Error types for fswalk
//!
//! This module defines the error hierarchy for the crate:
//! - Per-entry filesystem errors (readdir, stat, readlink, cycles)
//! - Configuration and CLI errors
//! - The top-level walk error, including the aggregate returned when a
//!   traversal collects several distinct failures
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Per-entry errors are cheap to clone and carry the offending path
//! - Identical errors collected during a walk collapse to a single value
//!   at reporting time

use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors raised while examining a single filesystem entry.
///
/// These are the errors the traversal engine routes through the error
/// policy (continue/stop/skip). They are `Clone` so the same value can be
/// delivered to the callback and retained in the collected error list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// Directory enumeration failed
    #[error("failed to read directory '{path}': {reason}")]
    ReadDir { path: String, reason: String },

    /// Lstat/stat on an individual entry failed
    #[error("failed to stat '{path}': {reason}")]
    Stat { path: String, reason: String },

    /// EACCES / EPERM variant of the above
    #[error("permission denied: '{path}'")]
    PermissionDenied { path: String },

    /// readlink on a symlink failed
    #[error("failed to read link '{path}': {reason}")]
    ReadLink { path: String, reason: String },

    /// Following the symlink would revisit an already-seen path
    #[error("symlink cycle detected at '{path}'")]
    Cycle { path: String },
}

impl EntryError {
    /// Classify an I/O error from a readdir call.
    pub fn read_dir(path: &Path, err: &io::Error) -> Self {
        if is_permission(err) {
            EntryError::PermissionDenied {
                path: path.display().to_string(),
            }
        } else {
            EntryError::ReadDir {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Classify an I/O error from an lstat/stat call.
    pub fn stat(path: &Path, err: &io::Error) -> Self {
        if is_permission(err) {
            EntryError::PermissionDenied {
                path: path.display().to_string(),
            }
        } else {
            EntryError::Stat {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Classify an I/O error from a readlink call.
    pub fn read_link(path: &Path, err: &io::Error) -> Self {
        if is_permission(err) {
            EntryError::PermissionDenied {
                path: path.display().to_string(),
            }
        } else {
            EntryError::ReadLink {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// The path this error refers to.
    pub fn path(&self) -> &str {
        match self {
            EntryError::ReadDir { path, .. }
            | EntryError::Stat { path, .. }
            | EntryError::PermissionDenied { path }
            | EntryError::ReadLink { path, .. }
            | EntryError::Cycle { path } => path,
        }
    }

    /// Whether this is a permission error (EACCES/EPERM).
    pub fn is_permission(&self) -> bool {
        matches!(self, EntryError::PermissionDenied { .. })
    }
}

fn is_permission(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Configuration and CLI errors
///
/// These are fatal and returned immediately: an invalid configuration never
/// starts a walk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No path argument given
    #[error("missing required argument: path")]
    MissingPath,

    /// Invalid worker count
    #[error("invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid glob or regex pattern
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Unknown error-handling mode
    #[error("unknown error mode '{mode}': expected continue, stop, or skip")]
    UnknownErrorMode { mode: String },

    /// Invalid size literal
    #[error("invalid size '{value}': {reason}")]
    InvalidSize { value: String, reason: String },

    /// Invalid duration literal
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    /// Invalid octal permission literal
    #[error("invalid permissions '{value}': expected octal digits, e.g. 0644")]
    InvalidPermissions { value: String },

    /// Invalid date literal
    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// Unknown file type name
    #[error(
        "unknown file type '{value}': expected file, dir, symlink, pipe, socket, device, or char"
    )]
    UnknownFileType { value: String },

    /// Unknown watch event name
    #[error("unknown watch event '{value}': expected create, modify, delete, rename, or chmod")]
    UnknownWatchEvent { value: String },

    /// Unknown output format name
    #[error("unknown output format '{value}': expected text or json")]
    UnknownFormat { value: String },
}

/// Top-level error type for fswalk operations
#[derive(Error, Debug)]
pub enum WalkError {
    /// Per-entry filesystem error
    #[error(transparent)]
    Entry(#[from] EntryError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Non-SkipDir error returned by the user callback
    #[error("callback failed for '{path}': {message}")]
    Callback { path: String, message: String },

    /// Cooperative cancellation or deadline expiry
    #[error("walk cancelled")]
    Cancelled,

    /// Watch subscription error
    #[error("watch error: {0}")]
    Watch(String),

    /// Aggregate of several distinct errors collected during one walk
    #[error("{}", format_multiple(.0))]
    Multiple(Vec<WalkError>),

    /// I/O errors outside the per-entry classification
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WalkError {
    /// Build a callback error from an arbitrary message.
    pub fn callback(path: &Path, message: impl Into<String>) -> Self {
        WalkError::Callback {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Whether this error represents cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WalkError::Cancelled)
    }

    /// Message-level equality, used when deduplicating collected errors.
    pub fn same_as(&self, other: &WalkError) -> bool {
        self.to_string() == other.to_string()
    }
}

fn format_multiple(errors: &[WalkError]) -> String {
    let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!("multiple errors: [{}]", rendered.join("; "))
}

/// Collapse a list of collected errors into the walk's return value.
///
/// Identical errors (by rendered message) deduplicate; a single distinct
/// error is returned as-is, several become [`WalkError::Multiple`]. An
/// empty list collapses to `None` (the walk succeeded).
pub fn collapse(errors: Vec<WalkError>) -> Option<WalkError> {
    let mut distinct: Vec<WalkError> = Vec::new();
    for err in errors {
        if !distinct.iter().any(|seen| seen.same_as(&err)) {
            distinct.push(err);
        }
    }

    match distinct.len() {
        0 => None,
        1 => Some(distinct.remove(0)),
        _ => Some(WalkError::Multiple(distinct)),
    }
}

/// Result type alias for WalkError
pub type Result<T> = std::result::Result<T, WalkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_permission_classification() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let entry_err = EntryError::stat(&PathBuf::from("/root/secret"), &err);
        assert!(entry_err.is_permission());
        assert_eq!(entry_err.path(), "/root/secret");

        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let entry_err = EntryError::stat(&PathBuf::from("/missing"), &err);
        assert!(!entry_err.is_permission());
    }

    #[test]
    fn test_collapse_empty() {
        assert!(collapse(Vec::new()).is_none());
    }

    #[test]
    fn test_collapse_identical() {
        let errs = vec![
            WalkError::Entry(EntryError::PermissionDenied { path: "/a".into() }),
            WalkError::Entry(EntryError::PermissionDenied { path: "/a".into() }),
        ];
        match collapse(errs) {
            Some(WalkError::Entry(EntryError::PermissionDenied { path })) => {
                assert_eq!(path, "/a");
            }
            other => panic!("expected collapsed permission error, got {:?}", other),
        }
    }

    #[test]
    fn test_collapse_distinct() {
        let errs = vec![
            WalkError::Cancelled,
            WalkError::Entry(EntryError::PermissionDenied { path: "/a".into() }),
        ];
        match collapse(errs) {
            Some(WalkError::Multiple(list)) => assert_eq!(list.len(), 2),
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_collapse_single_cancellation() {
        let errs = vec![WalkError::Cancelled, WalkError::Cancelled];
        assert!(matches!(collapse(errs), Some(WalkError::Cancelled)));
    }

    #[test]
    fn test_error_conversion() {
        let entry_err = EntryError::Cycle { path: "/loop".into() };
        let walk_err: WalkError = entry_err.into();
        assert!(matches!(walk_err, WalkError::Entry(_)));
    }
}
