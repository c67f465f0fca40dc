//! Serialized scan execution with request coalescing.
//!
//! A single worker task owns the scanner and is the only writer of
//! [`ScanState`]. Triggers go through a one-slot channel: while a request is
//! pending, further triggers are dropped, so a burst of requests never builds
//! a backlog. State is published as whole snapshots over a `watch` channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use dirtygit_core::{CoalesceMode, ScanConfig, ScanError, ScanState};

use crate::probe::StatusProbe;
use crate::progress::ScanProgress;
use crate::scanner::RepoScanner;

#[derive(Debug, Clone, Copy)]
struct ScanRequest {
    requested_at: Instant,
}

/// Front end for triggering scans and observing their results.
#[derive(Debug)]
pub struct ScanCoordinator {
    requests: mpsc::Sender<ScanRequest>,
    state_rx: watch::Receiver<ScanState>,
    scanner: Arc<RepoScanner>,
    current_scan: Arc<Mutex<CancellationToken>>,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl ScanCoordinator {
    /// Start a coordinator using the probe selected by `config.backend`.
    ///
    /// Must be called within a tokio runtime.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let scanner = RepoScanner::new(config)?;
        Ok(Self::start(scanner, config.coalesce))
    }

    /// Start a coordinator with an explicit status probe.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(config: &ScanConfig, probe: Arc<dyn StatusProbe>) -> Self {
        Self::start(RepoScanner::with_probe(config, probe), config.coalesce)
    }

    fn start(scanner: RepoScanner, mode: CoalesceMode) -> Self {
        let (requests, request_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(ScanState::new());
        let scanner = Arc::new(scanner);
        let current_scan = Arc::new(Mutex::new(CancellationToken::new()));
        let shutdown = CancellationToken::new();

        let worker = ScanWorker {
            scanner: Arc::clone(&scanner),
            requests: request_rx,
            state_tx,
            current_scan: Arc::clone(&current_scan),
            shutdown: shutdown.clone(),
            mode,
        };
        let worker = tokio::spawn(worker.run());

        Self {
            requests,
            state_rx,
            scanner,
            current_scan,
            shutdown,
            worker: Some(worker),
        }
    }

    /// Ask for a scan. Never blocks; dropped if a request is already pending.
    pub fn request_scan(&self) {
        let request = ScanRequest {
            requested_at: Instant::now(),
        };
        match self.requests.try_send(request) {
            Ok(()) => tracing::debug!("scan requested"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("scan already pending, request coalesced")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("scan worker has stopped, request ignored")
            }
        }
    }

    /// Current state snapshot. Never blocks on a running scan.
    pub fn current_state(&self) -> ScanState {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state_rx.clone()
    }

    /// Partial progress of running scans.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ScanProgress> {
        self.scanner.subscribe()
    }

    /// Cancel the scan in flight, if any. It completes with
    /// [`ScanError::Interrupted`] and the previous result is kept.
    ///
    /// Any scan observed as busy by a subscriber before this call is
    /// cancelled; a call made while idle has no effect on later scans.
    pub fn cancel_scan(&self) {
        lock(&self.current_scan).cancel();
    }

    /// Wait until more than `generation` scans have completed and return the
    /// state at that point.
    pub async fn completed_after(&self, generation: u64) -> ScanState {
        let mut rx = self.state_rx.clone();
        rx.wait_for(|state| state.generation > generation)
            .await
            .map(|state| state.clone())
            .unwrap_or_else(|_| self.state_rx.borrow().clone())
    }

    /// Wait for any running scan to finish, then request a fresh scan and
    /// wait for it. The returned result always comes from a traversal that
    /// started after this call.
    pub async fn scan_and_wait(&self) -> ScanState {
        let mut rx = self.state_rx.clone();
        let generation = rx
            .wait_for(ScanState::is_idle)
            .await
            .map(|state| state.generation)
            .unwrap_or_else(|_| self.state_rx.borrow().generation);
        self.request_scan();
        self.completed_after(generation).await
    }

    /// Stop the worker, cancelling any scan in flight.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "scan worker did not shut down cleanly");
            }
        }
    }
}

impl Drop for ScanCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// The single sequential scan loop.
struct ScanWorker {
    scanner: Arc<RepoScanner>,
    requests: mpsc::Receiver<ScanRequest>,
    state_tx: watch::Sender<ScanState>,
    current_scan: Arc<Mutex<CancellationToken>>,
    shutdown: CancellationToken,
    mode: CoalesceMode,
}

impl ScanWorker {
    async fn run(mut self) {
        loop {
            let request = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                request = self.requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            tracing::debug!(waited = ?request.requested_at.elapsed(), "starting scan");

            // Token swap and busy flag change together under the lock, so a
            // cancel either sees the old idle state or hits this scan.
            let cancel = self.shutdown.child_token();
            {
                let mut current = lock(&self.current_scan);
                *current = cancel.clone();
                self.state_tx.send_modify(|state| *state = state.started());
            }

            let outcome = self.scanner.scan(&cancel).await;

            // Drain before publishing idle so that a request made after a
            // consumer observes completion is never swallowed.
            if self.mode == CoalesceMode::DropWhileBusy {
                let mut dropped = 0usize;
                while self.requests.try_recv().is_ok() {
                    dropped += 1;
                }
                if dropped > 0 {
                    tracing::debug!(dropped, "discarded requests received during scan");
                }
            }
            self.state_tx.send_modify(|state| *state = state.finished(outcome));
        }
        tracing::debug!("scan worker stopped");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirtygit_core::{FileStatus, ProbeError, RepoStatus, StatusCode};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Reports every repository as modified, counting calls. Calls from
    /// `slow_from` onwards sleep for `delay` first.
    struct SlowProbe {
        delay: Duration,
        slow_from: usize,
        calls: AtomicUsize,
    }

    impl SlowProbe {
        fn new(delay: Duration) -> Arc<Self> {
            Self::slow_from(delay, 0)
        }

        fn slow_from(delay: Duration, slow_from: usize) -> Arc<Self> {
            Arc::new(Self {
                delay,
                slow_from,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatusProbe for SlowProbe {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn probe(&self, _repo: &Path) -> Result<RepoStatus, ProbeError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.slow_from {
                std::thread::sleep(self.delay);
            }
            let mut status = RepoStatus::new();
            status.insert("a.txt", FileStatus::new(StatusCode::Unmodified, StatusCode::Modified));
            Ok(status)
        }
    }

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("proj/.git")).unwrap();
        temp
    }

    fn config(temp: &TempDir, mode: CoalesceMode) -> ScanConfig {
        let mut config = ScanConfig::new([temp.path()]);
        config.coalesce = mode;
        config
    }

    async fn wait_busy(coordinator: &ScanCoordinator) {
        let mut rx = coordinator.subscribe();
        rx.wait_for(|state| state.busy).await.unwrap();
    }

    #[tokio::test]
    async fn test_burst_while_idle_runs_once() {
        let temp = fixture();
        let probe = SlowProbe::new(Duration::ZERO);
        let coordinator =
            ScanCoordinator::spawn(&config(&temp, CoalesceMode::RescanAfterBusy), probe.clone());

        for _ in 0..5 {
            coordinator.request_scan();
        }
        let state = coordinator.completed_after(0).await;
        assert_eq!(state.generation, 1);
        assert_eq!(state.last_result.len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(coordinator.current_state().generation, 1);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_requests_during_scan_are_dropped() {
        let temp = fixture();
        let probe = SlowProbe::new(Duration::from_millis(300));
        let coordinator =
            ScanCoordinator::spawn(&config(&temp, CoalesceMode::DropWhileBusy), probe.clone());

        coordinator.request_scan();
        wait_busy(&coordinator).await;
        for _ in 0..3 {
            coordinator.request_scan();
        }

        let state = coordinator.completed_after(0).await;
        assert!(state.is_idle());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(coordinator.current_state().generation, 1);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_requests_during_scan_give_one_rescan() {
        let temp = fixture();
        let probe = SlowProbe::new(Duration::from_millis(300));
        let coordinator =
            ScanCoordinator::spawn(&config(&temp, CoalesceMode::RescanAfterBusy), probe.clone());

        coordinator.request_scan();
        wait_busy(&coordinator).await;
        for _ in 0..3 {
            coordinator.request_scan();
        }

        let state = coordinator.completed_after(1).await;
        assert_eq!(state.generation, 2);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(coordinator.current_state().generation, 2);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_request_after_completion_starts_new_scan() {
        let temp = fixture();
        let probe = SlowProbe::new(Duration::ZERO);
        let coordinator =
            ScanCoordinator::spawn(&config(&temp, CoalesceMode::DropWhileBusy), probe.clone());

        assert_eq!(coordinator.scan_and_wait().await.generation, 1);
        assert_eq!(coordinator.scan_and_wait().await.generation, 2);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_keeps_previous_result() {
        let temp = fixture();
        let probe = SlowProbe::slow_from(Duration::from_millis(500), 1);
        let coordinator =
            ScanCoordinator::spawn(&config(&temp, CoalesceMode::DropWhileBusy), probe.clone());

        let first = coordinator.scan_and_wait().await;
        assert_eq!(first.last_result.len(), 1);
        assert!(first.last_error.is_none());

        coordinator.request_scan();
        wait_busy(&coordinator).await;
        coordinator.cancel_scan();
        let state = coordinator.completed_after(1).await;

        assert!(state.is_idle());
        assert_eq!(state.generation, 2);
        assert!(state.last_error.as_deref().is_some_and(ScanError::is_interrupted));
        assert!(Arc::ptr_eq(&state.last_result, &first.last_result));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scan_and_wait_during_scan_gets_fresh_scan() {
        let temp = fixture();
        let probe = SlowProbe::new(Duration::from_millis(300));
        let coordinator =
            ScanCoordinator::spawn(&config(&temp, CoalesceMode::DropWhileBusy), probe.clone());

        coordinator.request_scan();
        wait_busy(&coordinator).await;

        let state = coordinator.scan_and_wait().await;
        assert_eq!(state.generation, 2);
        assert!(state.last_error.is_none());
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_completed_after_returns_current_state() {
        let temp = fixture();
        let coordinator = ScanCoordinator::spawn(
            &config(&temp, CoalesceMode::DropWhileBusy),
            SlowProbe::new(Duration::ZERO),
        );
        let done = coordinator.scan_and_wait().await;

        let again = coordinator.completed_after(0).await;
        assert_eq!(again.generation, done.generation);
        assert!(Arc::ptr_eq(&again.last_result, &done.last_result));
    }

    #[tokio::test]
    async fn test_cancel_while_idle_does_not_affect_next_scan() {
        let temp = fixture();
        let coordinator = ScanCoordinator::spawn(
            &config(&temp, CoalesceMode::DropWhileBusy),
            SlowProbe::new(Duration::ZERO),
        );

        coordinator.cancel_scan();
        let state = coordinator.scan_and_wait().await;
        assert!(state.last_error.is_none());
        assert_eq!(state.last_result.len(), 1);

        coordinator.cancel_scan();
        let state = coordinator.scan_and_wait().await;
        assert!(state.last_error.is_none());
        assert_eq!(state.generation, 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let temp = fixture();
        let coordinator = ScanCoordinator::spawn(
            &config(&temp, CoalesceMode::DropWhileBusy),
            SlowProbe::new(Duration::ZERO),
        );
        assert_eq!(coordinator.scan_and_wait().await.generation, 1);
        coordinator.shutdown().await;
    }
}
