//! Status through the embedded libgit2 library.

use std::path::Path;

use git2::{Repository, Status, StatusOptions};

use dirtygit_core::{FileStatus, ProbeError, RepoStatus, StatusCode};

use super::StatusProbe;

/// Opens each repository with libgit2 and reads its status list.
///
/// Reports the same set as `git status --porcelain`: ignored files are left
/// out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Libgit2Probe;

impl Libgit2Probe {
    pub fn new() -> Self {
        Self
    }
}

impl StatusProbe for Libgit2Probe {
    fn name(&self) -> &'static str {
        "libgit2"
    }

    fn probe(&self, repo: &Path) -> Result<RepoStatus, ProbeError> {
        let repository = Repository::open(repo).map_err(repo_error)?;

        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .renames_head_to_index(true);

        let statuses = repository.statuses(Some(&mut options)).map_err(repo_error)?;

        let mut status = RepoStatus::new();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                tracing::debug!(repo = %repo.display(), "skipping non-utf8 path");
                continue;
            };
            let code = file_status(entry.status());
            if code != FileStatus::default() {
                status.insert(path, code);
            }
        }
        Ok(status)
    }
}

fn repo_error(err: git2::Error) -> ProbeError {
    ProbeError::Repository {
        message: err.message().to_string(),
    }
}

/// Map libgit2 status bits onto short-format codes.
fn file_status(bits: Status) -> FileStatus {
    use StatusCode::*;

    if bits.is_conflicted() {
        return FileStatus::new(UpdatedButUnmerged, UpdatedButUnmerged);
    }
    if bits.is_ignored() {
        return FileStatus::new(Ignored, Ignored);
    }
    if bits.is_wt_new() {
        return FileStatus::new(Untracked, Untracked);
    }

    let staging = if bits.is_index_new() {
        Added
    } else if bits.is_index_modified() {
        Modified
    } else if bits.is_index_deleted() {
        Deleted
    } else if bits.is_index_renamed() {
        Renamed
    } else if bits.is_index_typechange() {
        TypeChanged
    } else {
        Unmodified
    };

    let worktree = if bits.is_wt_modified() {
        Modified
    } else if bits.is_wt_deleted() {
        Deleted
    } else if bits.is_wt_renamed() {
        Renamed
    } else if bits.is_wt_typechange() {
        TypeChanged
    } else {
        Unmodified
    };

    FileStatus::new(staging, worktree)
}
