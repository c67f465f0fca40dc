//! Concurrent discovery of repository roots.
//!
//! One blocking traversal runs per include root. All of them share a
//! cancellation token and feed a single bounded channel of repository paths.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jwalk::{Parallelism, WalkDir};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use dirtygit_core::{ScanConfig, ScanError, ScanWarning};

use crate::filter::PathFilter;
use crate::tracker::RepoTracker;

/// Name of the directory that marks a working tree.
pub const GIT_DIR: &str = ".git";

/// Capacity of the discovered-repository channel.
pub const REPO_CHANNEL_SIZE: usize = 1000;

type Entry = jwalk::DirEntry<((), ())>;

/// Traversal settings.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub follow_symlinks: bool,
    /// Threads used within one root (0 or 1 = serial).
    pub threads: usize,
}

/// Totals for a finished walk.
#[derive(Debug, Clone, Default)]
pub struct WalkSummary {
    pub roots_walked: usize,
    pub repos_found: u64,
    pub warnings: Vec<ScanWarning>,
    pub duration: Duration,
}

/// Finds repository roots beneath a set of include roots.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    roots: Arc<[PathBuf]>,
    filter: Arc<PathFilter>,
    options: WalkOptions,
}

impl TreeWalker {
    pub fn new(roots: Vec<PathBuf>, filter: Arc<PathFilter>, options: WalkOptions) -> Self {
        Self {
            roots: roots.into(),
            filter,
            options,
        }
    }

    pub fn from_config(config: &ScanConfig, filter: Arc<PathFilter>) -> Self {
        Self::new(
            config.include_roots.clone(),
            filter,
            WalkOptions {
                follow_symlinks: config.follow_symlinks,
                threads: config.walk_threads,
            },
        )
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Start walking every root.
    ///
    /// Paths arrive unordered on the returned stream. Cancelling `cancel`
    /// stops all traversals; a fatal error in one root cancels it as well.
    /// Must be called within a tokio runtime.
    pub fn walk(&self, cancel: CancellationToken) -> RepoStream {
        let (tx, rx) = mpsc::channel(REPO_CHANNEL_SIZE);
        let tracker = Arc::new(RepoTracker::new());

        let mut walks = JoinSet::new();
        for root in self.roots.iter() {
            let walk = RootWalk {
                root: root.clone(),
                filter: Arc::clone(&self.filter),
                options: self.options.clone(),
                tracker: Arc::clone(&tracker),
                cancel: cancel.clone(),
                tx: tx.clone(),
            };
            walks.spawn_blocking(move || walk.run());
        }
        drop(tx);

        let handle = tokio::spawn(collect_walks(walks, cancel.clone()));

        RepoStream { rx, handle, cancel }
    }

    /// Walk to completion and collect every repository found.
    pub async fn discover(
        &self,
        cancel: CancellationToken,
    ) -> Result<(Vec<PathBuf>, WalkSummary), ScanError> {
        let mut stream = self.walk(cancel);
        let mut repos = Vec::new();
        while let Some(repo) = stream.next().await {
            repos.push(repo);
        }
        let summary = stream.finish().await?;
        Ok((repos, summary))
    }
}

/// Repository paths produced by a running walk.
#[derive(Debug)]
pub struct RepoStream {
    rx: mpsc::Receiver<PathBuf>,
    handle: JoinHandle<Result<WalkSummary, ScanError>>,
    cancel: CancellationToken,
}

impl RepoStream {
    /// Next discovered repository, or `None` once every root has finished.
    pub async fn next(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }

    /// Ask every traversal to stop at its next step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for all traversals to wind down and report the outcome.
    pub async fn finish(self) -> Result<WalkSummary, ScanError> {
        let Self { rx, handle, .. } = self;
        drop(rx);
        handle.await.unwrap_or_else(|err| {
            Err(ScanError::Other {
                message: format!("walk task failed: {err}"),
            })
        })
    }
}

async fn collect_walks(
    mut walks: JoinSet<Result<RootStats, ScanError>>,
    cancel: CancellationToken,
) -> Result<WalkSummary, ScanError> {
    let start = Instant::now();
    let mut summary = WalkSummary::default();
    let mut first_error = None;
    let mut interrupted = false;

    while let Some(joined) = walks.join_next().await {
        match joined {
            Ok(Ok(stats)) => {
                summary.roots_walked += 1;
                summary.repos_found += stats.repos_found;
                summary.warnings.extend(stats.warnings);
            }
            Ok(Err(ScanError::Interrupted)) => interrupted = true,
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
            }
            Err(err) => {
                cancel.cancel();
                first_error.get_or_insert(ScanError::Other {
                    message: format!("walk task failed: {err}"),
                });
            }
        }
    }
    summary.duration = start.elapsed();

    match first_error {
        Some(err) => Err(err),
        None if interrupted => Err(ScanError::Interrupted),
        None => Ok(summary),
    }
}

#[derive(Debug, Default)]
struct RootStats {
    repos_found: u64,
    warnings: Vec<ScanWarning>,
}

/// Traversal of a single include root.
struct RootWalk {
    root: PathBuf,
    filter: Arc<PathFilter>,
    options: WalkOptions,
    tracker: Arc<RepoTracker>,
    cancel: CancellationToken,
    tx: mpsc::Sender<PathBuf>,
}

enum Recovery {
    Skip(ScanWarning),
    Fatal(ScanError),
}

impl RootWalk {
    fn run(self) -> Result<RootStats, ScanError> {
        let mut stats = RootStats::default();
        if self.cancel.is_cancelled() {
            return Err(ScanError::Interrupted);
        }
        if self.filter.is_excluded_root(&self.root) {
            tracing::debug!(root = %self.root.display(), "root is excluded");
            return Ok(stats);
        }

        // A root that cannot be opened fails on its own; sibling roots keep going.
        let metadata = std::fs::symlink_metadata(&self.root).map_err(|source| {
            ScanError::RootUnavailable {
                path: self.root.clone(),
                source,
            }
        })?;
        if metadata.file_type().is_symlink() && !self.options.follow_symlinks {
            tracing::debug!(root = %self.root.display(), "root is a symlink, not following");
            return Ok(stats);
        }
        std::fs::read_dir(&self.root).map_err(|source| ScanError::RootUnavailable {
            path: self.root.clone(),
            source,
        })?;

        for item in self.walker() {
            if self.cancel.is_cancelled() {
                return Err(ScanError::Interrupted);
            }
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => match classify(err) {
                    Recovery::Skip(warning) => {
                        tracing::debug!(path = %warning.path.display(), "{}", warning.message);
                        stats.warnings.push(warning);
                        continue;
                    }
                    Recovery::Fatal(err) => {
                        tracing::warn!(root = %self.root.display(), error = %err, "aborting walk");
                        self.cancel.cancel();
                        return Err(err);
                    }
                },
            };

            if entry.depth() == 0 || entry.file_name() != OsStr::new(GIT_DIR) {
                continue;
            }
            if !entry.file_type().is_dir() {
                continue;
            }

            let repo = entry.parent_path().to_path_buf();
            if !self.tracker.track(&entry.path()) {
                continue;
            }
            tracing::debug!(repo = %repo.display(), "found repository");
            stats.repos_found += 1;
            if self.tx.blocking_send(repo).is_err() {
                // Receiver is gone: the scan was abandoned.
                return Err(ScanError::Interrupted);
            }
        }

        Ok(stats)
    }

    fn walker(&self) -> WalkDir {
        let filter = Arc::clone(&self.filter);
        let cancel = self.cancel.clone();
        let follow = self.options.follow_symlinks;

        WalkDir::new(&self.root)
            .parallelism(parallelism(self.options.threads))
            .skip_hidden(false)
            .follow_links(follow)
            .process_read_dir(move |_depth, _dir, _state, children| {
                if cancel.is_cancelled() {
                    children.clear();
                    return;
                }
                children.retain(|child| match child {
                    Ok(entry) => keep_entry(entry, &filter, follow),
                    Err(_) => true,
                });
                // A .git directory is terminal: report it, never read it.
                for entry in children.iter_mut().flatten() {
                    if entry.file_name() == OsStr::new(GIT_DIR) {
                        entry.read_children_path = None;
                    }
                }
            })
    }
}

fn keep_entry(entry: &Entry, filter: &PathFilter, follow: bool) -> bool {
    if filter.is_excluded_root(&entry.path()) {
        return false;
    }
    !(entry.path_is_symlink() && !follow)
}

fn parallelism(threads: usize) -> Parallelism {
    match threads {
        0 | 1 => Parallelism::Serial,
        n => Parallelism::RayonNewPool(n),
    }
}

/// Sort a traversal error into skippable and fatal.
fn classify(err: jwalk::Error) -> Recovery {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    if err.loop_ancestor().is_some() {
        return Recovery::Skip(ScanWarning::symlink_loop(path));
    }
    let message = err.to_string();
    match err.into_io_error() {
        Some(io) => match skippable(&path, &io) {
            Some(warning) => Recovery::Skip(warning),
            None => Recovery::Fatal(ScanError::io(path, io)),
        },
        None => Recovery::Fatal(ScanError::Other { message }),
    }
}

/// The warning to record for an I/O error that only loses one subtree, or
/// `None` if the error must abort the walk.
fn skippable(path: &Path, err: &io::Error) -> Option<ScanWarning> {
    match err.kind() {
        io::ErrorKind::PermissionDenied => Some(ScanWarning::permission_denied(path)),
        io::ErrorKind::NotFound => Some(ScanWarning::broken_symlink(path)),
        _ if is_symlink_loop(err) => Some(ScanWarning::symlink_loop(path)),
        _ => None,
    }
}

#[cfg(unix)]
fn is_symlink_loop(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ELOOP)
}

#[cfg(not(unix))]
fn is_symlink_loop(_err: &io::Error) -> bool {
    false
}
