//! Published scan state.

use std::sync::Arc;

use crate::error::ScanError;
use crate::result::ScanResult;

/// Snapshot of the coordinator's state.
///
/// A new snapshot replaces the old one on every transition, so a reader
/// always sees `busy`, `last_result` and `last_error` from the same moment.
/// Cloning is cheap: the result and error are shared.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    /// A scan is running (traversal, probing or aggregation).
    pub busy: bool,
    /// Number of scans that have finished, successfully or not.
    pub generation: u64,
    /// Result of the most recent successful scan.
    pub last_result: Arc<ScanResult>,
    /// Error from the most recent scan, cleared by the next success.
    pub last_error: Option<Arc<ScanError>>,
}

impl ScanState {
    /// Initial idle state with an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        !self.busy
    }

    /// Mark a scan as started.
    pub fn started(&self) -> Self {
        Self {
            busy: true,
            ..self.clone()
        }
    }

    /// The state after a scan finished. A failed scan keeps the previous
    /// result.
    pub fn finished(&self, outcome: Result<ScanResult, ScanError>) -> Self {
        let (last_result, last_error) = match outcome {
            Ok(result) => (Arc::new(result), None),
            Err(err) => (Arc::clone(&self.last_result), Some(Arc::new(err))),
        };
        Self {
            busy: false,
            generation: self.generation + 1,
            last_result,
            last_error,
        }
    }
}
