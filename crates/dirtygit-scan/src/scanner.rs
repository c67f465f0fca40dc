//! One complete scan: discovery, status probing, filtering and aggregation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use dirtygit_core::{ProbeError, RepoStatus, ScanConfig, ScanError, ScanResult};

use crate::filter::PathFilter;
use crate::probe::{StatusProbe, probe_for_config};
use crate::progress::{ProgressTracker, ScanProgress};
use crate::walker::TreeWalker;

/// Buffer size for progress broadcasts.
pub const PROGRESS_CHANNEL_SIZE: usize = 100;

type ProbeOutcome = (PathBuf, Result<RepoStatus, ProbeError>);

/// Runs scans for one configuration.
///
/// Discovered repositories are probed concurrently (bounded by
/// `probe_threads`); this scanner is the only writer of the aggregate.
pub struct RepoScanner {
    walker: TreeWalker,
    filter: Arc<PathFilter>,
    probe: Arc<dyn StatusProbe>,
    probe_limit: usize,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl RepoScanner {
    /// Create a scanner using the probe selected by the configuration.
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        Ok(Self::with_probe(config, probe_for_config(config)?))
    }

    /// Create a scanner with an explicit status probe.
    pub fn with_probe(config: &ScanConfig, probe: Arc<dyn StatusProbe>) -> Self {
        let filter = Arc::new(PathFilter::from_config(config));
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_SIZE);
        Self {
            walker: TreeWalker::from_config(config, Arc::clone(&filter)),
            filter,
            probe,
            probe_limit: config.probe_concurrency(),
            progress_tx,
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Perform one scan.
    ///
    /// The first fatal traversal error or probe error aborts the whole scan;
    /// nothing partial is returned.
    pub async fn scan(&self, cancel: &CancellationToken) -> Result<ScanResult, ScanError> {
        let start = Instant::now();
        let walk_cancel = cancel.child_token();
        let mut stream = self.walker.walk(walk_cancel.clone());
        let permits = Arc::new(Semaphore::new(self.probe_limit.max(1)));
        let mut probes: JoinSet<ProbeOutcome> = JoinSet::new();
        let mut tracker = ProgressTracker::new();
        let mut result = ScanResult::new();

        tracing::info!(
            roots = self.walker.roots().len(),
            probe = self.probe.name(),
            "scan started"
        );

        let mut walking = true;
        let outcome = loop {
            if !walking && probes.is_empty() {
                break Ok(());
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(ScanError::Interrupted),
                Some(joined) = probes.join_next(), if !probes.is_empty() => {
                    if let Err(err) = self.absorb(joined, &mut result, &mut tracker) {
                        break Err(err);
                    }
                }
                next = stream.next(), if walking => match next {
                    Some(repo) => {
                        tracker.record_found();
                        self.spawn_probe(&mut probes, &permits, repo);
                    }
                    None => walking = false,
                },
            }
        };

        if let Err(err) = outcome {
            walk_cancel.cancel();
            probes.abort_all();
            // Let sibling traversals wind down before reporting.
            let _ = stream.finish().await;
            tracing::warn!(error = %err, elapsed = ?start.elapsed(), "scan failed");
            return Err(err);
        }

        let summary = stream.finish().await?;
        result.stats.repos_found = summary.repos_found;
        result.stats.walk_duration = summary.duration;
        result.stats.warnings = summary.warnings;

        tracing::info!(
            walk_duration = ?result.stats.walk_duration,
            status_duration = ?result.stats.probe_duration,
            repos = result.stats.repos_found,
            dirty = result.len(),
            "scan finished"
        );
        Ok(result.finish())
    }

    fn spawn_probe(
        &self,
        probes: &mut JoinSet<ProbeOutcome>,
        permits: &Arc<Semaphore>,
        repo: PathBuf,
    ) {
        let probe = Arc::clone(&self.probe);
        let permits = Arc::clone(permits);
        probes.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let started = Instant::now();
            let target = repo.clone();
            let outcome = tokio::task::spawn_blocking(move || probe.probe(&target))
                .await
                .unwrap_or_else(|err| {
                    Err(ProbeError::Task {
                        message: err.to_string(),
                    })
                })
                .map(|mut status| {
                    status.scan_time = started.elapsed();
                    status
                });
            (repo, outcome)
        });
    }

    /// Fold one finished probe into the aggregate.
    fn absorb(
        &self,
        joined: Result<ProbeOutcome, tokio::task::JoinError>,
        result: &mut ScanResult,
        tracker: &mut ProgressTracker,
    ) -> Result<(), ScanError> {
        let (repo, outcome) = joined.map_err(|err| ScanError::Other {
            message: format!("status task failed: {err}"),
        })?;
        let status = outcome.map_err(|err| ScanError::probe(&repo, err))?;

        let filtered = self.filter.filter_status(&status);
        let dirty = !filtered.is_clean();
        tracing::debug!(repo = %repo.display(), scan_time = ?status.scan_time, dirty, "probed");

        result.stats.record_probe(filtered.scan_time, dirty);
        tracker.record_probed(repo.clone(), dirty);
        result.insert(repo, filtered);
        let _ = self.progress_tx.send(tracker.snapshot());
        Ok(())
    }
}

impl std::fmt::Debug for RepoScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoScanner")
            .field("walker", &self.walker)
            .field("probe", &self.probe.name())
            .field("probe_limit", &self.probe_limit)
            .finish()
    }
}
