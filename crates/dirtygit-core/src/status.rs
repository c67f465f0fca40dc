//! Per-file and per-repository status types.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single-character git status code, as used in short-format output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    #[default]
    Unmodified,
    Modified,
    TypeChanged,
    Added,
    Deleted,
    Renamed,
    Copied,
    UpdatedButUnmerged,
    Untracked,
    Ignored,
}

impl StatusCode {
    /// Decode a short-format status character.
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            ' ' => Self::Unmodified,
            'M' => Self::Modified,
            'T' => Self::TypeChanged,
            'A' => Self::Added,
            'D' => Self::Deleted,
            'R' => Self::Renamed,
            'C' => Self::Copied,
            'U' => Self::UpdatedButUnmerged,
            '?' => Self::Untracked,
            '!' => Self::Ignored,
            _ => return None,
        })
    }

    /// The short-format status character.
    pub fn as_char(self) -> char {
        match self {
            Self::Unmodified => ' ',
            Self::Modified => 'M',
            Self::TypeChanged => 'T',
            Self::Added => 'A',
            Self::Deleted => 'D',
            Self::Renamed => 'R',
            Self::Copied => 'C',
            Self::UpdatedButUnmerged => 'U',
            Self::Untracked => '?',
            Self::Ignored => '!',
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Staged and worktree state of one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileStatus {
    /// Index (staged) state.
    pub staging: StatusCode,
    /// Working tree state.
    pub worktree: StatusCode,
}

impl FileStatus {
    pub fn new(staging: StatusCode, worktree: StatusCode) -> Self {
        Self { staging, worktree }
    }

    /// An unmerged path: `DD`, `AU`, `UD`, `UA`, `DU`, `AA` or `UU`.
    pub fn is_conflicted(&self) -> bool {
        use StatusCode::*;
        matches!(
            (self.staging, self.worktree),
            (Deleted, Deleted)
                | (Added, Added)
                | (UpdatedButUnmerged, _)
                | (_, UpdatedButUnmerged)
        )
    }

    pub fn is_untracked(&self) -> bool {
        self.worktree == StatusCode::Untracked
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.staging, self.worktree)
    }
}

/// Status of every changed path in one repository, keyed by path relative to
/// the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatus {
    pub entries: BTreeMap<String, FileStatus>,
    /// Time taken to evaluate this repository.
    #[serde(default)]
    pub scan_time: Duration,
}

impl RepoStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the status of a path, replacing any previous entry.
    pub fn insert(&mut self, path: impl Into<String>, status: FileStatus) {
        self.entries.insert(path.into(), status);
    }

    pub fn get(&self, path: &str) -> Option<&FileStatus> {
        self.entries.get(path)
    }

    /// A repository is clean when no paths remain.
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileStatus)> {
        self.entries.iter()
    }

    /// Same timing, only the entries accepted by `keep`.
    pub fn retain_paths(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(path, _)| keep(path))
                .map(|(path, status)| (path.clone(), *status))
                .collect(),
            scan_time: self.scan_time,
        }
    }
}

impl FromIterator<(String, FileStatus)> for RepoStatus {
    fn from_iter<T: IntoIterator<Item = (String, FileStatus)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            scan_time: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_chars() {
        for c in [' ', 'M', 'T', 'A', 'D', 'R', 'C', 'U', '?', '!'] {
            let code = StatusCode::from_char(c).unwrap();
            assert_eq!(code.as_char(), c);
        }
        assert_eq!(StatusCode::from_char('X'), None);
    }

    #[test]
    fn test_file_status_display() {
        let status = FileStatus::new(StatusCode::Unmodified, StatusCode::Modified);
        assert_eq!(status.to_string(), " M");

        let untracked = FileStatus::new(StatusCode::Untracked, StatusCode::Untracked);
        assert_eq!(untracked.to_string(), "??");
        assert!(untracked.is_untracked());
        assert!(!untracked.is_conflicted());
    }

    #[test]
    fn test_conflicted_pairs() {
        let parse = |code: &str| {
            let mut chars = code.chars();
            FileStatus::new(
                StatusCode::from_char(chars.next().unwrap()).unwrap(),
                StatusCode::from_char(chars.next().unwrap()).unwrap(),
            )
        };

        for code in ["DD", "AU", "UD", "UA", "DU", "AA", "UU"] {
            assert!(parse(code).is_conflicted(), "{code} should be unmerged");
        }
        for code in ["D ", " D", "A ", "AM", "MM", "??", "!!"] {
            assert!(!parse(code).is_conflicted(), "{code} should not be unmerged");
        }
    }

    #[test]
    fn test_retain_paths_keeps_input() {
        let mut status = RepoStatus::new();
        status.insert("a.txt", FileStatus::new(StatusCode::Added, StatusCode::Unmodified));
        status.insert("b.log", FileStatus::new(StatusCode::Unmodified, StatusCode::Modified));
        status.scan_time = Duration::from_millis(5);

        let filtered = status.retain_paths(|p| !p.ends_with(".log"));
        assert_eq!(filtered.len(), 1);
        assert!(filtered.get("a.txt").is_some());
        assert_eq!(filtered.scan_time, Duration::from_millis(5));
        assert_eq!(status.len(), 2);
    }
}
