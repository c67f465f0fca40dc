//! Config file loading.
//!
//! The file is YAML and defaults to `~/.dirtygit.yml`:
//!
//! ```yaml
//! scandirs:
//!   include: [~/src]
//!   exclude: [~/src/vendor]
//! gitignore:
//!   fileglob: ["*.log"]
//!   dirglob: [node_modules]
//! followsymlinks: false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};

use dirtygit_core::{CoalesceMode, ScanConfig, StatusBackend};

/// Name of the config file in the home directory.
pub const CONFIG_FILE_NAME: &str = ".dirtygit.yml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanDirs {
    pub include: Vec<PathBuf>,
    pub exclude: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitIgnore {
    pub fileglob: Vec<String>,
    pub dirglob: Vec<String>,
}

/// On-disk configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub scandirs: ScanDirs,
    pub gitignore: GitIgnore,
    pub followsymlinks: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StatusBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probethreads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walkthreads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitbinary: Option<PathBuf>,
    pub rescanwhilebusy: bool,
}

/// `~/.dirtygit.yml`, if the home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

impl ConfigFile {
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).wrap_err("Invalid config file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&yaml).wrap_err_with(|| format!("Failed to parse {}", path.display()))
    }

    /// Load an explicitly named file, or the default file if it exists.
    /// A missing default file yields an empty config.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Build the scan configuration, expanding `~/` against `home`.
    pub fn to_scan_config(&self, home: Option<&Path>) -> Result<ScanConfig> {
        let expand = |paths: &[PathBuf]| -> Vec<PathBuf> {
            paths.iter().map(|p| expand_home(p, home)).collect()
        };

        let mut builder = ScanConfig::builder();
        builder
            .include_roots(expand(&self.scandirs.include))
            .exclude_roots(expand(&self.scandirs.exclude))
            .file_globs(self.gitignore.fileglob.clone())
            .dir_globs(self.gitignore.dirglob.clone())
            .follow_symlinks(self.followsymlinks)
            .coalesce(if self.rescanwhilebusy {
                CoalesceMode::RescanAfterBusy
            } else {
                CoalesceMode::DropWhileBusy
            });
        if let Some(backend) = self.backend {
            builder.backend(backend);
        }
        if let Some(threads) = self.probethreads {
            builder.probe_threads(threads);
        }
        if let Some(threads) = self.walkthreads {
            builder.walk_threads(threads);
        }
        if let Some(git) = &self.gitbinary {
            builder.git_binary(expand_home(git, home));
        }

        builder
            .build()
            .map_err(|err| eyre!("Invalid configuration: {err}"))
    }
}

/// Replace a leading `~` component with the home directory.
pub fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HISTORICAL: &str = r#"
scandirs:
  include:
    - ~/src
    - /work
  exclude:
    - ~/src/vendor
gitignore:
  fileglob:
    - "*.log"
  dirglob:
    - node_modules
followsymlinks: true
"#;

    #[test]
    fn test_parse_historical_format() {
        let file = ConfigFile::parse(HISTORICAL).unwrap();
        assert_eq!(file.scandirs.include.len(), 2);
        assert_eq!(file.scandirs.exclude, vec![PathBuf::from("~/src/vendor")]);
        assert_eq!(file.gitignore.fileglob, vec!["*.log"]);
        assert_eq!(file.gitignore.dirglob, vec!["node_modules"]);
        assert!(file.followsymlinks);
        assert!(file.backend.is_none());
    }

    #[test]
    fn test_to_scan_config_expands_home() {
        let file = ConfigFile::parse(HISTORICAL).unwrap();
        let config = file.to_scan_config(Some(Path::new("/home/me"))).unwrap();

        assert_eq!(
            config.include_roots,
            vec![PathBuf::from("/home/me/src"), PathBuf::from("/work")]
        );
        assert_eq!(config.exclude_roots, vec![PathBuf::from("/home/me/src/vendor")]);
        assert!(config.follow_symlinks);
        assert_eq!(config.backend, StatusBackend::Git);
        assert_eq!(config.coalesce, CoalesceMode::DropWhileBusy);
    }

    #[test]
    fn test_extra_keys() {
        let yaml = r#"
scandirs:
  include: [/work]
backend: libgit2
probethreads: 8
walkthreads: 2
gitbinary: /usr/local/bin/git
rescanwhilebusy: true
"#;
        let config = ConfigFile::parse(yaml).unwrap().to_scan_config(None).unwrap();
        assert_eq!(config.backend, StatusBackend::Libgit2);
        assert_eq!(config.probe_threads, 8);
        assert_eq!(config.walk_threads, 2);
        assert_eq!(config.git_binary, PathBuf::from("/usr/local/bin/git"));
        assert_eq!(config.coalesce, CoalesceMode::RescanAfterBusy);
    }

    #[test]
    fn test_empty_include_is_rejected() {
        let file = ConfigFile::parse("followsymlinks: false\n").unwrap();
        assert!(file.to_scan_config(None).is_err());
    }

    #[test]
    fn test_expand_home() {
        let home = Some(Path::new("/home/me"));
        assert_eq!(expand_home(Path::new("~"), home), PathBuf::from("/home/me"));
        assert_eq!(expand_home(Path::new("~/a"), home), PathBuf::from("/home/me/a"));
        assert_eq!(expand_home(Path::new("~other/a"), home), PathBuf::from("~other/a"));
        assert_eq!(expand_home(Path::new("~/a"), None), PathBuf::from("~/a"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, HISTORICAL).unwrap();

        let file = ConfigFile::resolve(Some(&path)).unwrap();
        assert!(file.followsymlinks);

        let missing = temp.path().join("missing.yml");
        assert!(ConfigFile::resolve(Some(&missing)).is_err());
    }
}
