//! Aggregated scan results and statistics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScanWarning;
use crate::status::RepoStatus;

/// Summary statistics for one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Repositories discovered by traversal.
    pub repos_found: u64,
    /// Repositories whose status was evaluated.
    pub repos_probed: u64,
    /// Repositories with changes left after filtering.
    pub repos_dirty: u64,
    /// Wall time spent walking the include roots.
    pub walk_duration: Duration,
    /// Sum of all per-repository status times.
    pub probe_duration: Duration,
    /// Traversal errors that were skipped over.
    pub warnings: Vec<ScanWarning>,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one evaluated repository.
    pub fn record_probe(&mut self, scan_time: Duration, dirty: bool) {
        self.repos_probed += 1;
        self.probe_duration += scan_time;
        if dirty {
            self.repos_dirty += 1;
        }
    }
}

/// Every repository that still has changes after filtering, from one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub repositories: BTreeMap<PathBuf, RepoStatus>,
    pub stats: ScanStats,
    /// When the scan completed; `None` for the empty startup result.
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a repository. Clean statuses are ignored.
    pub fn insert(&mut self, repo: PathBuf, status: RepoStatus) -> bool {
        if status.is_clean() {
            return false;
        }
        self.repositories.insert(repo, status);
        true
    }

    pub fn get(&self, repo: &Path) -> Option<&RepoStatus> {
        self.repositories.get(repo)
    }

    pub fn contains(&self, repo: &Path) -> bool {
        self.repositories.contains_key(repo)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Repository paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.repositories.keys().map(PathBuf::as_path)
    }

    /// Stamp the completion time.
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{FileStatus, StatusCode};

    #[test]
    fn test_insert_skips_clean() {
        let mut result = ScanResult::new();
        assert!(!result.insert(PathBuf::from("/work/clean"), RepoStatus::new()));
        assert!(result.is_empty());

        let mut status = RepoStatus::new();
        status.insert("x", FileStatus::new(StatusCode::Added, StatusCode::Unmodified));
        assert!(result.insert(PathBuf::from("/work/dirty"), status));
        assert!(result.contains(Path::new("/work/dirty")));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_stats_record_probe() {
        let mut stats = ScanStats::new();
        stats.record_probe(Duration::from_millis(10), true);
        stats.record_probe(Duration::from_millis(5), false);

        assert_eq!(stats.repos_probed, 2);
        assert_eq!(stats.repos_dirty, 1);
        assert_eq!(stats.probe_duration, Duration::from_millis(15));
    }
}
