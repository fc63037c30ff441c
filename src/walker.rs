use std::path::{Path, PathBuf};

use crate::config::GraphConfig;
use crate::language::LanguageKind;

/// Directory names that are never indexed, regardless of `.gitignore`.
const HARD_EXCLUSIONS: &[&str] = &[
    "__pycache__",
    ".venv",
    "venv",
    ".git",
    "node_modules",
    ".tox",
    ".mypy_cache",
];

/// Walk a workspace directory and collect Python source files.
///
/// Respects `.gitignore` rules (even outside a git repository), hidden-file filters, the
/// hard exclusions above, and any additional exclusions from `config.exclude`. The result
/// is sorted so builds are deterministic.
pub fn discover(root: &Path, config: &GraphConfig) -> Vec<PathBuf> {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git repository.
        .require_git(false)
        .filter_entry(|entry| !is_hard_excluded(entry.path()))
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("{err}");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        if is_excluded_by_config(path, root, config) {
            continue;
        }
        if LanguageKind::from_path(path).is_none() {
            continue;
        }

        tracing::trace!(path = %path.display(), "discovered");
        files.push(path.to_path_buf());
    }

    files.sort();
    files
}

/// Returns true if the last component of `path` is one of the hard exclusions.
fn is_hard_excluded(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| HARD_EXCLUSIONS.contains(&n))
}

/// Returns true if any directory between `root` and `path` is a hard exclusion.
pub(crate) fn has_excluded_component(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .any(|c| HARD_EXCLUSIONS.contains(&c))
}

/// Returns true if `path` matches any exclusion pattern from config.
///
/// A pattern matches the path relative to the root, or any single component of it.
pub fn is_excluded_by_config(path: &Path, root: &Path, config: &GraphConfig) -> bool {
    let Some(patterns) = &config.exclude else {
        return false;
    };

    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel_str = rel.to_string_lossy();

    for pattern in patterns {
        let Ok(compiled) = glob::Pattern::new(pattern) else {
            tracing::warn!(pattern = %pattern, "ignoring invalid exclude pattern");
            continue;
        };
        if compiled.matches(&rel_str) {
            return true;
        }
        let component_match = rel
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .any(|s| compiled.matches(s));
        if component_match {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_discover_returns_only_python_files() {
        let dir = tmp();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("stubs.pyi"), "x: int\n").unwrap();
        fs::write(dir.path().join("README.md"), "# Hello").unwrap();
        fs::write(dir.path().join("lib.rs"), "fn main() {}").unwrap();

        let files = discover(dir.path(), &GraphConfig::default());
        let names = names(dir.path(), &files);

        assert_eq!(names, vec!["a.py", "stubs.pyi"], "only .py/.pyi, sorted");
    }

    #[test]
    fn test_discover_skips_hard_exclusions() {
        let dir = tmp();
        for excluded in ["__pycache__", ".venv", "venv", "node_modules"] {
            let d = dir.path().join(excluded);
            fs::create_dir_all(&d).unwrap();
            fs::write(d.join("junk.py"), "x = 1\n").unwrap();
        }
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg").join("__init__.py"), "").unwrap();

        let files = discover(dir.path(), &GraphConfig::default());
        assert_eq!(names(dir.path(), &files), vec!["pkg/__init__.py"]);
    }

    #[test]
    fn test_discover_honours_gitignore_without_git() {
        let dir = tmp();
        fs::write(dir.path().join(".gitignore"), "generated/\n").unwrap();
        fs::create_dir_all(dir.path().join("generated")).unwrap();
        fs::write(dir.path().join("generated").join("out.py"), "").unwrap();
        fs::write(dir.path().join("main.py"), "").unwrap();

        let files = discover(dir.path(), &GraphConfig::default());
        assert_eq!(names(dir.path(), &files), vec!["main.py"]);
    }

    #[test]
    fn test_discover_respects_exclude_patterns() {
        let dir = tmp();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build").join("gen.py"), "").unwrap();
        fs::write(dir.path().join("api_pb2.py"), "").unwrap();
        fs::write(dir.path().join("api.py"), "").unwrap();

        let config = GraphConfig {
            exclude: Some(vec!["build".to_string(), "*_pb2.py".to_string()]),
            ..Default::default()
        };
        let files = discover(dir.path(), &config);
        assert_eq!(names(dir.path(), &files), vec!["api.py"]);
    }
}
