//! Error types for scanning operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that terminate a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An include root could not be opened at all.
    #[error("Cannot open scan root {path}: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Status evaluation failed for a repository.
    #[error("{path}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: ProbeError,
    },

    /// The scan was cancelled before it completed.
    #[error("Scan interrupted")]
    Interrupted,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Tag a probe failure with the repository it came from.
    pub fn probe(path: impl Into<PathBuf>, source: ProbeError) -> Self {
        Self::Probe {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the result of cancellation rather than a failure.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Errors produced while evaluating a single repository's status.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The git executable could not be started.
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    /// git ran but reported failure.
    #[error("git status exited with {status}: {stderr}")]
    Command { status: String, stderr: String },

    /// A status line was too short or not splittable.
    #[error("unable to parse status: '{line}'")]
    Parse { line: String },

    /// A status line carried a code outside the known set.
    #[error("unknown status code '{code}' in '{line}'")]
    UnknownCode { code: char, line: String },

    /// The path could not be opened as a working tree.
    #[error("not a usable working tree: {message}")]
    Repository { message: String },

    /// The probe task itself failed.
    #[error("status task failed: {message}")]
    Task { message: String },
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Symbolic link target does not exist.
    BrokenSymlink,
    /// Symbolic links form a cycle.
    SymlinkLoop,
    /// Error reading a directory.
    ReadError,
}

/// Non-fatal traversal error that was swallowed; the subtree was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }

    /// Create a broken symlink warning.
    pub fn broken_symlink(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Broken symlink: {}", path.display()),
            path,
            kind: WarningKind::BrokenSymlink,
        }
    }

    /// Create a symlink cycle warning.
    pub fn symlink_loop(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Symlink loop: {}", path.display()),
            path,
            kind: WarningKind::SymlinkLoop,
        }
    }
}
