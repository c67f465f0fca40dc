//! Scan progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Progress information during a scan.
///
/// This is partial progress only; the aggregate result is published once the
/// scan has finished.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Repositories discovered so far.
    pub repos_found: u64,
    /// Repositories whose status has been evaluated.
    pub repos_probed: u64,
    /// Repositories with changes left after filtering.
    pub repos_dirty: u64,
    /// Most recently evaluated repository.
    pub current_path: PathBuf,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            repos_found: 0,
            repos_probed: 0,
            repos_dirty: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Repositories discovered but not yet evaluated.
    pub fn pending(&self) -> u64 {
        self.repos_found.saturating_sub(self.repos_probed)
    }

    /// Evaluation rate in repositories per second.
    pub fn repos_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.repos_probed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal progress tracker with timing.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    repos_found: u64,
    repos_probed: u64,
    repos_dirty: u64,
    current_path: PathBuf,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            repos_found: 0,
            repos_probed: 0,
            repos_dirty: 0,
            current_path: PathBuf::new(),
        }
    }

    pub fn record_found(&mut self) {
        self.repos_found += 1;
    }

    pub fn record_probed(&mut self, path: PathBuf, dirty: bool) {
        self.repos_probed += 1;
        if dirty {
            self.repos_dirty += 1;
        }
        self.current_path = path;
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            repos_found: self.repos_found,
            repos_probed: self.repos_probed,
            repos_dirty: self.repos_dirty,
            current_path: self.current_path.clone(),
            elapsed: self.start_time.elapsed(),
        }
    }
}
