use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::stable_graph::NodeIndex;

use crate::graph::node::{ExternalModuleInfo, SymbolId, SymbolKind, UnresolvedReason};
use crate::graph::{AmbiguousBinding, WorkspaceGraph};
use crate::language::absolute_module;
use crate::parser::imports::{ImportInfo, ImportStyle};

/// What a name, import or member access resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// A workspace symbol or, for module imports, a `File` node.
    Node(NodeIndex),
    External(ExternalModuleInfo),
    Unresolved {
        name: String,
        reason: UnresolvedReason,
    },
}

impl Target {
    pub(crate) fn is_resolved(&self) -> bool {
        !matches!(self, Target::Unresolved { .. })
    }
}

/// The module-level binding table of one file.
#[derive(Debug, Default)]
pub(crate) struct Bindings {
    pub names: HashMap<String, NodeIndex>,
    /// `from m import *` symbols in source order.
    pub wildcards: Vec<NodeIndex>,
    pub ambiguities: Vec<AmbiguousBinding>,
}

/// Resolution order of competing module-level bindings: definitions, then plain imports,
/// then aliased imports.
fn binding_rank(graph: &WorkspaceGraph, node: NodeIndex) -> Option<(u8, usize)> {
    let info = graph.symbol_info(node)?;
    if info.parent.is_some() {
        return None;
    }
    let rank = match (&info.kind, &info.import) {
        (SymbolKind::Function | SymbolKind::Class | SymbolKind::Variable, _) => 0,
        (SymbolKind::Import, Some(import)) if import.style == ImportStyle::Wildcard => return None,
        (SymbolKind::Import, Some(import)) if import.is_aliased() => 2,
        (SymbolKind::Import, _) => 1,
        _ => return None,
    };
    Some((rank, info.span.start))
}

/// Build the binding table of `path`. Names bound more than once keep the first binding in
/// resolution order; the others are reported as ambiguities.
pub(crate) fn module_bindings(graph: &WorkspaceGraph, path: &Path) -> Bindings {
    let mut bindings = Bindings::default();
    let Some(entry) = graph.files.get(path) else {
        return bindings;
    };

    let mut candidates: HashMap<&str, Vec<(u8, usize, NodeIndex)>> = HashMap::new();
    for &node in &entry.symbols {
        let Some(info) = graph.symbol_info(node) else {
            continue;
        };
        if info.kind == SymbolKind::Import
            && info.import.as_ref().is_some_and(|i| i.style == ImportStyle::Wildcard)
        {
            bindings.wildcards.push(node);
            continue;
        }
        if let Some((rank, start)) = binding_rank(graph, node) {
            candidates.entry(info.name.as_str()).or_default().push((rank, start, node));
        }
    }

    for (name, mut nodes) in candidates {
        nodes.sort_by_key(|&(rank, start, _)| (rank, start));
        let chosen = nodes[0].2;
        bindings.names.insert(name.to_owned(), chosen);
        if nodes.len() > 1 {
            tracing::debug!(
                file = %path.display(),
                name,
                candidates = nodes.len(),
                "ambiguous module-level binding"
            );
            bindings.ambiguities.push(AmbiguousBinding {
                file: path.to_path_buf(),
                name: name.to_owned(),
                candidates: nodes.iter().map(|&(_, _, n)| SymbolId(n)).collect(),
                chosen: SymbolId(chosen),
            });
        }
    }
    bindings.ambiguities.sort_by(|a, b| a.name.cmp(&b.name));
    bindings
}

/// The winning module-level binding of `name` in `path`, without building the full table.
pub(crate) fn binding(graph: &WorkspaceGraph, path: &Path, name: &str) -> Option<NodeIndex> {
    let entry = graph.files.get(path)?;
    entry
        .symbols
        .iter()
        .filter(|&&n| graph.symbol_info(n).is_some_and(|s| s.name == name))
        .filter_map(|&n| binding_rank(graph, n).map(|rank| (rank, n)))
        .min_by_key(|&(rank, _)| rank)
        .map(|(_, n)| n)
}

fn wildcards(graph: &WorkspaceGraph, path: &Path) -> Vec<NodeIndex> {
    let Some(entry) = graph.files.get(path) else {
        return Vec::new();
    };
    entry
        .symbols
        .iter()
        .copied()
        .filter(|&n| {
            graph
                .symbol_info(n)
                .and_then(|s| s.import.as_ref())
                .is_some_and(|i| i.style == ImportStyle::Wildcard)
        })
        .collect()
}

/// Absolute dotted module an import in `importer` refers to.
pub(crate) fn import_module(graph: &WorkspaceGraph, importer: &Path, import: &ImportInfo) -> Option<String> {
    let module = graph.file(importer).map(|f| f.module.as_str()).unwrap_or("");
    absolute_module(module, graph.is_package(importer), &import.module)
}

/// The `File` node of a workspace module.
pub(crate) fn module_node(graph: &WorkspaceGraph, module: &str) -> Option<NodeIndex> {
    let path = graph.module_index.get(module)?;
    graph.files.get(path).map(|e| e.node)
}

/// Resolve an import to its final definition, following re-export hops.
///
/// Returns the target and the intermediate import symbols walked through. A hop chain that
/// comes back to a `(file, name)` pair already visited resolves to
/// [`UnresolvedReason::CyclicImport`].
pub(crate) fn resolve_import(
    graph: &WorkspaceGraph,
    importer: &Path,
    import: &ImportInfo,
) -> (Target, Vec<NodeIndex>) {
    let mut visited = HashSet::new();
    let mut via = Vec::new();
    let target = resolve_import_inner(graph, importer, import, &mut visited, &mut via);
    (target, via)
}

fn resolve_import_inner(
    graph: &WorkspaceGraph,
    importer: &Path,
    import: &ImportInfo,
    visited: &mut HashSet<(PathBuf, String)>,
    via: &mut Vec<NodeIndex>,
) -> Target {
    let Some(module) = import_module(graph, importer, import) else {
        return Target::Unresolved {
            name: import.module.clone(),
            reason: UnresolvedReason::UnknownName,
        };
    };

    match import.style {
        ImportStyle::Module | ImportStyle::Wildcard => match module_node(graph, &module) {
            Some(node) => Target::Node(node),
            None => Target::External(ExternalModuleInfo { module, name: None }),
        },
        ImportStyle::From => {
            let member = import.member.clone().unwrap_or_default();
            match graph.module_index.get(&module).cloned() {
                Some(path) => resolve_member(graph, &path, &module, &member, visited, via),
                None => match module_node(graph, &format!("{module}.{member}")) {
                    // `from pkg import sub` with `pkg` a namespace directory.
                    Some(node) => Target::Node(node),
                    None => Target::External(ExternalModuleInfo {
                        module,
                        name: Some(member),
                    }),
                },
            }
        }
    }
}

/// Resolve `name` as a member of the workspace module stored at `path`.
///
/// Lookup order: the module's own binding (imports are followed as hops), a submodule
/// `module.name`, then the module's wildcard imports in source order.
pub(crate) fn resolve_member(
    graph: &WorkspaceGraph,
    path: &Path,
    module: &str,
    name: &str,
    visited: &mut HashSet<(PathBuf, String)>,
    via: &mut Vec<NodeIndex>,
) -> Target {
    if !visited.insert((path.to_path_buf(), name.to_owned())) {
        return Target::Unresolved {
            name: name.to_owned(),
            reason: UnresolvedReason::CyclicImport,
        };
    }

    if let Some(node) = binding(graph, path, name) {
        return match graph.symbol_info(node).and_then(|s| s.import.as_ref()) {
            Some(import) => {
                via.push(node);
                resolve_import_inner(graph, path, import, visited, via)
            }
            None => Target::Node(node),
        };
    }

    if let Some(node) = module_node(graph, &format!("{module}.{name}")) {
        return Target::Node(node);
    }

    for wildcard in wildcards(graph, path) {
        let Some(import) = graph.symbol_info(wildcard).and_then(|s| s.import.as_ref()) else {
            continue;
        };
        let Some(source) = import_module(graph, path, import) else {
            continue;
        };
        let Some(source_path) = graph.module_index.get(&source).cloned() else {
            continue;
        };
        let mark = via.len();
        via.push(wildcard);
        match resolve_member(graph, &source_path, &source, name, visited, via) {
            target @ (Target::Node(_) | Target::External(_)) => return target,
            Target::Unresolved { .. } => via.truncate(mark),
        }
    }

    Target::Unresolved {
        name: name.to_owned(),
        reason: UnresolvedReason::MissingMember {
            module: module.to_owned(),
        },
    }
}

/// Resolve `name` as a member of whatever `target` denotes (a module file or an external
/// module). `None` when the target has no members to speak of.
pub(crate) fn member_of(graph: &WorkspaceGraph, target: &Target, name: &str) -> Option<Target> {
    match target {
        Target::Node(node) => {
            let file = graph.graph.node_weight(*node)?.as_file()?;
            let (path, module) = (file.path.clone(), file.module.clone());
            let mut visited = HashSet::new();
            let mut via = Vec::new();
            Some(resolve_member(graph, &path, &module, name, &mut visited, &mut via))
        }
        Target::External(ExternalModuleInfo { module, name: None }) => {
            Some(Target::External(ExternalModuleInfo {
                module: module.clone(),
                name: Some(name.to_owned()),
            }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CarryPool;
    use crate::graph::node::FileInfo;
    use crate::language::LanguageKind;
    use crate::parser::parse_file;
    use crate::storage::FileMeta;
    use std::sync::Arc;

    fn build(files: &[(&str, &str, &str)]) -> WorkspaceGraph {
        let mut graph = WorkspaceGraph::new("/w");
        let mut pool = CarryPool::default();
        for (path, module, text) in files {
            let parsed = parse_file(Path::new(path), text).unwrap();
            let info = FileInfo {
                path: PathBuf::from(path),
                language: LanguageKind::Python,
                module: (*module).to_owned(),
                text: Arc::from(*text),
                meta: FileMeta::default(),
                parse_error: None,
            };
            graph.install_file(info, Some(parsed), &mut pool);
        }
        graph.reindex();
        graph
    }

    fn import_of<'g>(graph: &'g WorkspaceGraph, path: &str, name: &str) -> &'g ImportInfo {
        let node = binding(graph, Path::new(path), name).unwrap();
        graph.symbol_info(node).unwrap().import.as_ref().unwrap()
    }

    fn name_of(graph: &WorkspaceGraph, target: &Target) -> String {
        match target {
            Target::Node(n) => graph.symbol_info(*n).map(|s| s.qualified_name.clone()).unwrap_or_default(),
            other => format!("{other:?}"),
        }
    }

    #[test]
    fn test_reexport_chain_is_followed() {
        let graph = build(&[
            ("/w/a.py", "a", "def helper():\n    pass\n"),
            ("/w/b.py", "b", "from a import helper\n"),
            ("/w/c.py", "c", "from b import helper\n"),
        ]);
        let (target, via) = resolve_import(&graph, Path::new("/w/c.py"), import_of(&graph, "/w/c.py", "helper"));
        assert_eq!(name_of(&graph, &target), "helper");
        assert_eq!(
            graph.symbol_info(match target { Target::Node(n) => n, _ => unreachable!() }).unwrap().file,
            PathBuf::from("/w/a.py")
        );
        assert_eq!(via.len(), 1, "one hop through b");
    }

    #[test]
    fn test_cyclic_reexport_is_unresolved() {
        let graph = build(&[
            ("/w/a.py", "a", "from b import x\n"),
            ("/w/b.py", "b", "from a import x\n"),
        ]);
        let (target, _) = resolve_import(&graph, Path::new("/w/a.py"), import_of(&graph, "/w/a.py", "x"));
        assert!(matches!(
            target,
            Target::Unresolved { reason: UnresolvedReason::CyclicImport, .. }
        ));
    }

    #[test]
    fn test_missing_member_and_external() {
        let graph = build(&[
            ("/w/a.py", "a", "X = 1\n"),
            ("/w/b.py", "b", "from a import nope\nfrom os.path import join\nimport json\n"),
        ]);
        let (missing, _) = resolve_import(&graph, Path::new("/w/b.py"), import_of(&graph, "/w/b.py", "nope"));
        assert_eq!(
            missing,
            Target::Unresolved {
                name: "nope".into(),
                reason: UnresolvedReason::MissingMember { module: "a".into() }
            }
        );
        let (join, _) = resolve_import(&graph, Path::new("/w/b.py"), import_of(&graph, "/w/b.py", "join"));
        assert_eq!(
            join,
            Target::External(ExternalModuleInfo { module: "os.path".into(), name: Some("join".into()) })
        );
        let (json, _) = resolve_import(&graph, Path::new("/w/b.py"), import_of(&graph, "/w/b.py", "json"));
        assert_eq!(json, Target::External(ExternalModuleInfo { module: "json".into(), name: None }));
    }

    #[test]
    fn test_relative_import_and_wildcard_hop() {
        let graph = build(&[
            ("/w/pkg/__init__.py", "pkg", "from .impl import *\n"),
            ("/w/pkg/impl.py", "pkg.impl", "class Engine:\n    pass\n"),
            ("/w/app.py", "app", "from pkg import Engine\n"),
        ]);
        let (target, via) = resolve_import(&graph, Path::new("/w/app.py"), import_of(&graph, "/w/app.py", "Engine"));
        assert_eq!(name_of(&graph, &target), "Engine");
        assert_eq!(via.len(), 1, "the wildcard import is the hop");
    }

    #[test]
    fn test_definitions_win_over_imports() {
        let graph = build(&[("/w/a.py", "a", "from os import path\n\ndef path():\n    pass\n")]);
        let bindings = module_bindings(&graph, Path::new("/w/a.py"));
        let chosen = bindings.names["path"];
        assert_eq!(graph.symbol_info(chosen).unwrap().kind, SymbolKind::Function);
        assert_eq!(bindings.ambiguities.len(), 1);
        assert_eq!(bindings.ambiguities[0].candidates.len(), 2);
    }
}
