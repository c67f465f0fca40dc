//! Core types for dirtygit.
//!
//! This crate provides the data model shared by the scan pipeline and its
//! consumers: the scan configuration, per-file status codes, per-repository
//! status maps, aggregated scan results and the published scan state.

mod config;
mod error;
mod result;
mod state;
mod status;

pub use config::{CoalesceMode, ScanConfig, ScanConfigBuilder, StatusBackend};
pub use error::{ProbeError, ScanError, ScanWarning, WarningKind};
pub use result::{ScanResult, ScanStats};
pub use state::ScanState;
pub use status::{FileStatus, RepoStatus, StatusCode};
