//! Status through the `git` executable.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use dirtygit_core::{ProbeError, RepoStatus};

use super::{StatusProbe, parse_porcelain};

/// Runs `git -C <repo> status --porcelain` and parses its output.
#[derive(Debug, Clone)]
pub struct GitCliProbe {
    git: PathBuf,
}

impl GitCliProbe {
    pub fn new(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }

    fn command(&self, repo: &Path) -> Command {
        let mut cmd = Command::new(&self.git);
        cmd.arg("-C")
            .arg(repo)
            .args(["status", "--porcelain"])
            // Read-only probe: never take the index lock.
            .env("GIT_OPTIONAL_LOCKS", "0")
            // These override -C, e.g. when run from inside a git hook.
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .stdin(Stdio::null());
        cmd
    }
}

impl Default for GitCliProbe {
    fn default() -> Self {
        Self::new("git")
    }
}

impl StatusProbe for GitCliProbe {
    fn name(&self) -> &'static str {
        "git"
    }

    fn probe(&self, repo: &Path) -> Result<RepoStatus, ProbeError> {
        let output = self.command(repo).output().map_err(ProbeError::Spawn)?;
        if !output.status.success() {
            return Err(ProbeError::Command {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_porcelain(&String::from_utf8_lossy(&output.stdout))
    }
}
