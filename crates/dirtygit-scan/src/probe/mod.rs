//! Per-repository status evaluation.
//!
//! A [`StatusProbe`] takes the repository path explicitly on every call and
//! never touches the process working directory, so probes for different
//! repositories can run in parallel.

mod cli;
#[cfg(feature = "libgit2")]
mod libgit2;

use std::path::Path;
use std::sync::Arc;

use dirtygit_core::{
    FileStatus, ProbeError, RepoStatus, ScanConfig, ScanError, StatusBackend, StatusCode,
};

pub use cli::GitCliProbe;
#[cfg(feature = "libgit2")]
pub use libgit2::Libgit2Probe;

/// Produces the status of one working tree.
pub trait StatusProbe: Send + Sync {
    /// Short name for logs (e.g., "git", "libgit2").
    fn name(&self) -> &'static str;

    /// Status of every changed, staged or untracked path in `repo`.
    fn probe(&self, repo: &Path) -> Result<RepoStatus, ProbeError>;
}

/// Build the probe selected by `config.backend`.
pub fn probe_for_config(config: &ScanConfig) -> Result<Arc<dyn StatusProbe>, ScanError> {
    match config.backend {
        StatusBackend::Git => Ok(Arc::new(GitCliProbe::new(&config.git_binary))),
        #[cfg(feature = "libgit2")]
        StatusBackend::Libgit2 => Ok(Arc::new(Libgit2Probe::new())),
        #[cfg(not(feature = "libgit2"))]
        StatusBackend::Libgit2 => Err(ScanError::InvalidConfig {
            message: "libgit2 backend is not compiled in".to_string(),
        }),
    }
}

/// Parse short-format status output (`git status --porcelain`).
///
/// Each line is two status characters, one separator character, then the
/// path. Blank lines are ignored.
pub fn parse_porcelain(output: &str) -> Result<RepoStatus, ProbeError> {
    let mut status = RepoStatus::new();
    for line in output.lines().filter(|l| !l.is_empty()) {
        let (code, path) = parse_line(line)?;
        status.insert(path, code);
    }
    Ok(status)
}

fn parse_line(line: &str) -> Result<(FileStatus, &str), ProbeError> {
    let parse_error = || ProbeError::Parse {
        line: line.to_string(),
    };
    if line.len() < 4 {
        return Err(parse_error());
    }
    let mut chars = line.chars();
    let (Some(x), Some(y)) = (chars.next(), chars.next()) else {
        return Err(parse_error());
    };
    let path = line.get(3..).ok_or_else(parse_error)?;

    let decode = |c: char| {
        StatusCode::from_char(c).ok_or_else(|| ProbeError::UnknownCode {
            code: c,
            line: line.to_string(),
        })
    };
    Ok((FileStatus::new(decode(x)?, decode(y)?), path))
}
