//! Repository discovery and status scanning engine for dirtygit.
//!
//! # Overview
//!
//! `dirtygit-scan` finds every git working tree under a set of root
//! directories and reports the ones with uncommitted changes. Key features:
//!
//! - **Concurrent traversal** of all roots via jwalk, streaming repositories
//!   as they are found
//! - **Parallel status probing** through the `git` executable or libgit2
//! - **Exclusion** of roots and of status paths by file and directory glob
//! - **Coalesced scan requests** with snapshot state published over a
//!   `watch` channel
//!
//! # Example
//!
//! ```rust,no_run
//! use dirtygit_scan::{ScanConfig, ScanCoordinator};
//!
//! # async fn run() -> Result<(), dirtygit_scan::ScanError> {
//! let config = ScanConfig::new(["/home/me/src"]);
//! let coordinator = ScanCoordinator::from_config(&config)?;
//!
//! let state = coordinator.scan_and_wait().await;
//! for (repo, status) in state.last_result.repositories.iter() {
//!     println!("{}: {} changed", repo.display(), status.len());
//! }
//! coordinator.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! # use dirtygit_scan::{ScanConfig, ScanCoordinator};
//! # fn watch(coordinator: &ScanCoordinator) {
//! let mut progress_rx = coordinator.subscribe_progress();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Probed {} of {} repositories", progress.repos_probed, progress.repos_found);
//!     }
//! });
//! # }
//! ```

mod coordinator;
mod filter;
pub mod probe;
mod progress;
mod scanner;
mod tracker;
mod walker;

pub use coordinator::ScanCoordinator;
pub use filter::PathFilter;
pub use probe::{GitCliProbe, StatusProbe, parse_porcelain, probe_for_config};
#[cfg(feature = "libgit2")]
pub use probe::Libgit2Probe;
pub use progress::ScanProgress;
pub use scanner::RepoScanner;
pub use tracker::RepoTracker;
pub use walker::{RepoStream, TreeWalker, WalkOptions, WalkSummary};

// Re-export core types for convenience
pub use dirtygit_core::{
    CoalesceMode, FileStatus, ProbeError, RepoStatus, ScanConfig, ScanError, ScanResult,
    ScanState, ScanStats, ScanWarning, StatusBackend, StatusCode, WarningKind,
};
