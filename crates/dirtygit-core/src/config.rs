//! Scan configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Which implementation produces per-repository status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBackend {
    /// Run `git status --porcelain` against each repository.
    #[default]
    #[serde(alias = "cli")]
    Git,
    /// Use the embedded libgit2 library.
    Libgit2,
}

/// What happens to scan requests that arrive while a scan is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoalesceMode {
    /// Requests received during a scan are dropped when it completes; the
    /// finished scan already reflects the latest trigger.
    #[default]
    DropWhileBusy,
    /// A request received during a scan results in exactly one follow-up scan.
    RescanAfterBusy,
}

/// Configuration for a repository scan. Immutable for the duration of a scan.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Directories to search for repositories, walked concurrently.
    pub include_roots: Vec<PathBuf>,

    /// Directories pruned from traversal. Matched exactly, not as globs.
    #[builder(default)]
    #[serde(default)]
    pub exclude_roots: Vec<PathBuf>,

    /// Globs matched against the base name of each changed file.
    #[builder(default)]
    #[serde(default)]
    pub file_globs: Vec<String>,

    /// Globs matched against every directory segment of each changed file.
    #[builder(default)]
    #[serde(default)]
    pub dir_globs: Vec<String>,

    /// Follow symbolic links during traversal.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Traversal threads per root (0 or 1 = serial walk of each root).
    #[builder(default = "0")]
    #[serde(default)]
    pub walk_threads: usize,

    /// Maximum concurrent status probes (0 = number of CPUs).
    #[builder(default = "0")]
    #[serde(default)]
    pub probe_threads: usize,

    /// Status implementation.
    #[builder(default)]
    #[serde(default)]
    pub backend: StatusBackend,

    /// Executable used by the git CLI backend.
    #[builder(default = "default_git_binary()")]
    #[serde(default = "default_git_binary")]
    pub git_binary: PathBuf,

    /// Handling of scan requests that arrive mid-scan.
    #[builder(default)]
    #[serde(default)]
    pub coalesce: CoalesceMode,
}

fn default_git_binary() -> PathBuf {
    PathBuf::from("git")
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.include_roots {
            Some(ref roots) => check_roots(roots),
            None => Err("At least one include root is required".to_string()),
        }
    }
}

fn check_roots(roots: &[PathBuf]) -> Result<(), String> {
    if roots.is_empty() {
        return Err("At least one include root is required".to_string());
    }
    if roots.iter().any(|r| r.as_os_str().is_empty()) {
        return Err("Include roots cannot be empty paths".to_string());
    }
    Ok(())
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a config that scans the given roots with default settings.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            include_roots: roots.into_iter().map(Into::into).collect(),
            exclude_roots: Vec::new(),
            file_globs: Vec::new(),
            dir_globs: Vec::new(),
            follow_symlinks: false,
            walk_threads: 0,
            probe_threads: 0,
            backend: StatusBackend::default(),
            git_binary: default_git_binary(),
            coalesce: CoalesceMode::default(),
        }
    }

    /// Check a config that was assembled without the builder.
    pub fn validate(&self) -> Result<(), ScanError> {
        check_roots(&self.include_roots).map_err(|message| ScanError::InvalidConfig { message })
    }

    /// Effective probe concurrency.
    pub fn probe_concurrency(&self) -> usize {
        match self.probe_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            n => n,
        }
    }
}
