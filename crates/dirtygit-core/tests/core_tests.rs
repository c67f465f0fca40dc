use std::path::{Path, PathBuf};
use std::time::Duration;

use dirtygit_core::{
    CoalesceMode, FileStatus, RepoStatus, ScanConfig, ScanResult, ScanState, StatusBackend,
    StatusCode,
};

fn modified(path: &str) -> (String, FileStatus) {
    (
        path.to_string(),
        FileStatus::new(StatusCode::Unmodified, StatusCode::Modified),
    )
}

#[test]
fn test_scan_config_builder() {
    let config = ScanConfig::builder()
        .include_roots(vec![PathBuf::from("/work/a"), PathBuf::from("/work/b")])
        .exclude_roots(vec![PathBuf::from("/work/a/vendor")])
        .file_globs(vec!["*.log".to_string()])
        .dir_globs(vec!["target".to_string()])
        .backend(StatusBackend::Libgit2)
        .coalesce(CoalesceMode::RescanAfterBusy)
        .build()
        .unwrap();

    assert_eq!(config.include_roots[1], PathBuf::from("/work/b"));
    assert_eq!(config.exclude_roots, vec![PathBuf::from("/work/a/vendor")]);
    assert_eq!(config.backend, StatusBackend::Libgit2);
    assert_eq!(config.coalesce, CoalesceMode::RescanAfterBusy);
    assert!(!config.follow_symlinks);

    let default_config = ScanConfig::new(["/default"]);
    assert_eq!(default_config.include_roots, vec![PathBuf::from("/default")]);
    assert_eq!(default_config.backend, StatusBackend::Git);
    assert_eq!(default_config.walk_threads, 0);
}

#[test]
fn test_scan_config_json_defaults() {
    let config: ScanConfig =
        serde_json::from_str(r#"{"include_roots": ["/src"], "backend": "libgit2"}"#).unwrap();

    assert_eq!(config.include_roots, vec![PathBuf::from("/src")]);
    assert_eq!(config.backend, StatusBackend::Libgit2);
    assert_eq!(config.git_binary, PathBuf::from("git"));
    assert!(config.exclude_roots.is_empty());
    assert_eq!(config.coalesce, CoalesceMode::DropWhileBusy);
}

#[test]
fn test_repo_status_from_iter() {
    let status: RepoStatus = [modified("src/x.txt"), modified("README.md")]
        .into_iter()
        .collect();

    assert_eq!(status.len(), 2);
    assert!(!status.is_clean());
    assert_eq!(status.get("src/x.txt").unwrap().to_string(), " M");
    assert_eq!(status.scan_time, Duration::ZERO);
}

#[test]
fn test_scan_result_serializes_by_path() {
    let mut result = ScanResult::new();
    result.insert(
        PathBuf::from("/work/a/proj1"),
        [modified("src/x.txt")].into_iter().collect(),
    );
    let result = result.finish();

    let json = serde_json::to_value(&result).unwrap();
    let entry = &json["repositories"]["/work/a/proj1"]["entries"]["src/x.txt"];
    assert_eq!(entry["staging"], "unmodified");
    assert_eq!(entry["worktree"], "modified");
    assert!(result.finished_at.is_some());
    assert_eq!(result.paths().collect::<Vec<_>>(), vec![Path::new("/work/a/proj1")]);
}

#[test]
fn test_state_snapshots_are_independent() {
    let idle = ScanState::new();
    let busy = idle.started();

    assert!(idle.is_idle());
    assert!(busy.busy);
    assert!(busy.last_result.is_empty());
}
