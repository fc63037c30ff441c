use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Name of the optional configuration file at the workspace root.
pub const CONFIG_FILE: &str = "program-graph.toml";

/// Files larger than this are recorded as parse errors instead of being parsed.
pub const DEFAULT_MAX_FILE_BYTES: usize = 2 * 1024 * 1024;

/// Configuration loaded from `program-graph.toml` at the workspace root.
///
/// ```toml
/// exclude = ["build", "*_pb2.py"]
/// threads = 4
/// max_file_bytes = 1048576
/// source_roots = ["src"]
/// ```
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    /// Additional path patterns to exclude from indexing (beyond .gitignore and the hard exclusions).
    pub exclude: Option<Vec<String>>,
    /// Size of the parse pool. Defaults to the number of CPUs.
    pub threads: Option<usize>,
    /// Upper bound on the size of a parsed file.
    pub max_file_bytes: Option<usize>,
    /// Directories, relative to the root, that module paths are computed from.
    /// The workspace root is always a source root.
    pub source_roots: Option<Vec<PathBuf>>,
}

impl GraphConfig {
    /// Load configuration from `program-graph.toml` in the given root directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match Self::read(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("{err:#}. Using defaults.");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str::<Self>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes.unwrap_or(DEFAULT_MAX_FILE_BYTES)
    }

    /// `Some(n)` when a positive thread count was configured.
    pub fn threads(&self) -> Option<usize> {
        self.threads.filter(|n| *n > 0)
    }

    /// Absolute source roots: the configured ones followed by `root` itself.
    pub fn source_roots(&self, root: &Path) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .source_roots
            .iter()
            .flatten()
            .map(|r| root.join(r))
            .collect();
        roots.push(root.to_path_buf());
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GraphConfig::load(dir.path());
        assert_eq!(config, GraphConfig::default());
        assert_eq!(config.max_file_bytes(), DEFAULT_MAX_FILE_BYTES);
        assert_eq!(config.threads(), None);
    }

    #[test]
    fn test_load_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "exclude = [\"build\"]\nthreads = 3\nmax_file_bytes = 100\nsource_roots = [\"src\"]\n",
        )
        .unwrap();

        let config = GraphConfig::load(dir.path());
        assert_eq!(config.exclude.as_deref(), Some(&["build".to_string()][..]));
        assert_eq!(config.threads(), Some(3));
        assert_eq!(config.max_file_bytes(), 100);
        assert_eq!(
            config.source_roots(dir.path()),
            vec![dir.path().join("src"), dir.path().to_path_buf()]
        );
    }

    #[test]
    fn test_invalid_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "threads = \"many\"").unwrap();
        assert_eq!(GraphConfig::load(dir.path()), GraphConfig::default());
    }

    #[test]
    fn test_zero_threads_means_default() {
        let config = GraphConfig {
            threads: Some(0),
            ..Default::default()
        };
        assert_eq!(config.threads(), None);
    }
}
