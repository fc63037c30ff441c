use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Represents a programming language handled by program-graph.
///
/// Uses a plain enum (not trait objects) so dispatch stays a `match` at the parser
/// boundary. Python is the only grammar wired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageKind {
    Python,
}

impl LanguageKind {
    /// Returns true if this language kind matches a given file extension.
    pub fn matches_extension(&self, ext: &str) -> bool {
        match self {
            LanguageKind::Python => matches!(ext, "py" | "pyi"),
        }
    }

    /// Detect the language from a path's extension.
    pub fn from_path(path: &Path) -> Option<LanguageKind> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        [LanguageKind::Python]
            .into_iter()
            .find(|lk| lk.matches_extension(ext))
    }
}

/// Map a source file to its dotted module path.
///
/// The path is made relative to the longest matching entry of `source_roots`:
/// - `pkg/mod.py`      -> `pkg.mod`
/// - `pkg/__init__.py` -> `pkg`
/// - `stubs/x.pyi`     -> `stubs.x`
///
/// Returns `None` if the file is not under any source root or a path component is not a
/// valid identifier-ish UTF-8 segment.
pub fn module_name(source_roots: &[PathBuf], path: &Path) -> Option<String> {
    let root = source_roots
        .iter()
        .filter(|r| path.starts_with(r))
        .max_by_key(|r| r.components().count())?;
    let rel = path.strip_prefix(root).ok()?;

    let mut parts: Vec<String> = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(os) => parts.push(os.to_str()?.to_owned()),
            _ => return None,
        }
    }
    let last = parts.pop()?;
    let stem = last
        .strip_suffix(".py")
        .or_else(|| last.strip_suffix(".pyi"))?;
    if stem != "__init__" {
        parts.push(stem.to_owned());
    }
    Some(parts.join("."))
}

/// Resolve a possibly relative module reference (`.utils`, `..pkg`) written in the module
/// `importer`, which is a package itself when `importer_is_package` is set.
///
/// Returns `None` when the leading dots climb above the top-level package.
pub fn absolute_module(importer: &str, importer_is_package: bool, written: &str) -> Option<String> {
    let dots = written.chars().take_while(|c| *c == '.').count();
    if dots == 0 {
        return Some(written.to_owned());
    }
    let rest = &written[dots..];

    let mut base: Vec<&str> = if importer.is_empty() {
        Vec::new()
    } else {
        importer.split('.').collect()
    };
    if !importer_is_package {
        // A plain module's package is its parent.
        base.pop()?;
    }
    for _ in 1..dots {
        base.pop()?;
    }
    if !rest.is_empty() {
        base.extend(rest.split('.'));
    }
    Some(base.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_extension() {
        assert!(LanguageKind::Python.matches_extension("py"));
        assert!(LanguageKind::Python.matches_extension("pyi"));
        assert!(!LanguageKind::Python.matches_extension("pyc"));
        assert!(!LanguageKind::Python.matches_extension("rs"));
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            LanguageKind::from_path(Path::new("/w/pkg/a.py")),
            Some(LanguageKind::Python)
        );
        assert_eq!(LanguageKind::from_path(Path::new("/w/README.md")), None);
        assert_eq!(LanguageKind::from_path(Path::new("/w/Makefile")), None);
    }

    #[test]
    fn test_module_name() {
        let roots = vec![PathBuf::from("/w")];
        assert_eq!(module_name(&roots, Path::new("/w/a.py")).as_deref(), Some("a"));
        assert_eq!(
            module_name(&roots, Path::new("/w/pkg/sub/mod.py")).as_deref(),
            Some("pkg.sub.mod")
        );
        assert_eq!(
            module_name(&roots, Path::new("/w/pkg/__init__.py")).as_deref(),
            Some("pkg")
        );
        assert_eq!(module_name(&roots, Path::new("/other/a.py")), None);
    }

    #[test]
    fn test_module_name_prefers_deepest_root() {
        let roots = vec![PathBuf::from("/w"), PathBuf::from("/w/src")];
        assert_eq!(
            module_name(&roots, Path::new("/w/src/app/core.py")).as_deref(),
            Some("app.core")
        );
    }

    #[test]
    fn test_absolute_module() {
        assert_eq!(absolute_module("pkg.mod", false, "os.path").as_deref(), Some("os.path"));
        assert_eq!(absolute_module("pkg.mod", false, ".utils").as_deref(), Some("pkg.utils"));
        assert_eq!(absolute_module("pkg.mod", false, ".").as_deref(), Some("pkg"));
        assert_eq!(absolute_module("pkg", true, ".utils").as_deref(), Some("pkg.utils"));
        assert_eq!(
            absolute_module("pkg.sub.mod", false, "..base").as_deref(),
            Some("pkg.base")
        );
        assert_eq!(absolute_module("mod", false, "..x"), None);
    }
}
