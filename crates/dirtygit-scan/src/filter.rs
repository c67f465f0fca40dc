//! Exclusion rules for traversal roots and status entries.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use dirtygit_core::{RepoStatus, ScanConfig};

/// Decides which subtrees to prune during traversal and which changed paths
/// to drop from a repository's status.
///
/// Globs use shell semantics (`*`, `?`, `[...]`, backslash escapes) and are
/// case-sensitive; braces are literal characters, not alternation. File
/// globs match the base name of a path, directory globs match each directory
/// segment on its own. Patterns that fail to compile never match.
#[derive(Debug, Clone)]
pub struct PathFilter {
    exclude_roots: HashSet<PathBuf>,
    files: GlobSet,
    dirs: GlobSet,
}

impl PathFilter {
    pub fn new(
        exclude_roots: impl IntoIterator<Item = PathBuf>,
        file_globs: &[String],
        dir_globs: &[String],
    ) -> Self {
        Self {
            exclude_roots: exclude_roots.into_iter().collect(),
            files: compile(file_globs),
            dirs: compile(dir_globs),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            config.exclude_roots.iter().cloned(),
            &config.file_globs,
            &config.dir_globs,
        )
    }

    /// Whether a changed path should be left out of a status report.
    pub fn is_excluded_status_path(&self, path: &str) -> bool {
        let (dir, base) = match path.rsplit_once('/') {
            Some((dir, base)) => (dir, base),
            None => ("", path),
        };
        if self.files.is_match(base) {
            return true;
        }
        if self.dirs.is_empty() {
            return false;
        }
        dir.split('/')
            .filter(|segment| !segment.is_empty())
            .any(|segment| self.dirs.is_match(segment))
    }

    /// A copy of `status` without the excluded paths.
    pub fn filter_status(&self, status: &RepoStatus) -> RepoStatus {
        status.retain_paths(|path| !self.is_excluded_status_path(path))
    }

    /// Whether traversal should skip this directory and everything under it.
    pub fn is_excluded_root(&self, path: &Path) -> bool {
        self.exclude_roots.contains(path)
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new(Vec::new(), &[], &[])
    }
}

fn compile(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(&literal_braces(pattern)) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => tracing::warn!(pattern = %pattern, error = %err, "ignoring invalid glob"),
        }
    }
    builder.build().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "glob set failed to build, no paths will match");
        GlobSet::empty()
    })
}

/// Rewrite `{` and `}` outside character classes as one-character classes,
/// since globset would otherwise read them as alternation.
fn literal_braces(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains(['{', '}']) {
        return Cow::Borrowed(pattern);
    }
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
                if let Some(&negate @ ('!' | '^')) = chars.peek() {
                    out.push(negate);
                    chars.next();
                }
                // A leading `]` is a member, not the end of the class.
                if chars.peek() == Some(&']') {
                    out.push(']');
                    chars.next();
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '{' | '}' if !in_class => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
