//! Repository de-duplication across concurrent traversals.

use std::path::{Path, PathBuf};

use dashmap::DashSet;

/// Tracks `.git` directories already reported during one walk.
///
/// Overlapping include roots, or symlinked aliases when links are followed,
/// can reach the same repository more than once. Entries are keyed by the
/// canonical path of the `.git` directory so every alias collapses to one.
#[derive(Debug, Default)]
pub struct RepoTracker {
    seen: DashSet<PathBuf>,
}

impl RepoTracker {
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Track a `.git` directory. Returns `true` if this is the first time
    /// seeing it.
    pub fn track(&self, git_dir: &Path) -> bool {
        let key = std::fs::canonicalize(git_dir).unwrap_or_else(|_| git_dir.to_path_buf());
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_track_once() {
        let temp = TempDir::new().unwrap();
        let git_dir = temp.path().join("repo/.git");
        std::fs::create_dir_all(&git_dir).unwrap();

        let tracker = RepoTracker::new();
        assert!(tracker.track(&git_dir));
        assert!(!tracker.track(&git_dir));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_aliases_collapse() {
        let temp = TempDir::new().unwrap();
        let git_dir = temp.path().join("repo/.git");
        std::fs::create_dir_all(&git_dir).unwrap();

        let tracker = RepoTracker::new();
        assert!(tracker.track(&git_dir));
        assert!(!tracker.track(&temp.path().join("repo/../repo/.git")));
    }

    #[test]
    fn test_missing_path_uses_raw_key() {
        let tracker = RepoTracker::new();
        assert!(tracker.is_empty());
        assert!(tracker.track(Path::new("/does/not/exist/.git")));
        assert!(!tracker.track(Path::new("/does/not/exist/.git")));
    }
}
