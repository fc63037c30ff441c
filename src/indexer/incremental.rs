use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use rayon::prelude::*;

use crate::graph::edge::EdgeKind;
use crate::graph::node::{GraphNode, UnresolvedReason};
use crate::parser::imports::ImportStyle;
use crate::graph::{CarryPool, WorkspaceGraph};
use crate::resolver::imports::import_module;
use crate::resolver::{self, ResolveStats};

use super::LoadedChange;

/// What a rebuild touched.
#[derive(Debug, Default, Clone)]
pub struct RebuildReport {
    /// Every file whose edges were recomputed: the changed files plus the affected ones.
    pub rebuilt: Vec<PathBuf>,
    pub stats: ResolveStats,
}

/// True if `module` is `changed` itself or one of its parent packages.
fn names_module(module: &str, changed: &str) -> bool {
    module == changed
        || changed
            .strip_prefix(module)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// `modules` plus every module that re-exports one of them through `from m import *`,
/// directly or through a chain of wildcard imports.
fn wildcard_closure(graph: &WorkspaceGraph, modules: &HashSet<String>) -> HashSet<String> {
    let mut closure = modules.clone();
    let mut grew = true;
    while grew {
        grew = false;
        for (path, entry) in &graph.files {
            let Some(module) = graph.file(path).map(|f| f.module.as_str()) else {
                continue;
            };
            if module.is_empty() || closure.contains(module) {
                continue;
            }
            let reexports = entry
                .symbols
                .iter()
                .filter_map(|&n| graph.symbol_info(n).and_then(|s| s.import.as_ref()))
                .filter(|i| i.style == ImportStyle::Wildcard)
                .filter_map(|i| import_module(graph, path, i))
                .any(|source| closure.contains(&source));
            if reexports {
                closure.insert(module.to_owned());
                grew = true;
            }
        }
    }
    closure
}

/// Files whose resolution may change when `changed` files change.
///
/// Computed on the graph *before* the change:
/// - files owning a derived edge into any node of a changed file, or into a class deriving
///   (transitively) from a changed class, since inherited members may appear or vanish
/// - files whose import hops (`via`) walk through a changed file's import
/// - files with unresolved or external imports naming a changed module (or a submodule
///   of one), since a created file can make them resolvable. Modules re-exporting a
///   changed module through wildcard imports count as changed here.
pub(crate) fn affected_files(
    graph: &WorkspaceGraph,
    changed: &[PathBuf],
    modules: &HashSet<String>,
) -> BTreeSet<PathBuf> {
    let mut changed_nodes: HashSet<NodeIndex> = HashSet::new();
    for path in changed {
        if let Some(entry) = graph.files.get(path) {
            changed_nodes.insert(entry.node);
            changed_nodes.extend(entry.symbols.iter().copied());
        }
    }

    let mut subclasses: HashSet<NodeIndex> = HashSet::new();
    let mut frontier: Vec<NodeIndex> = changed_nodes.iter().copied().collect();
    while let Some(node) = frontier.pop() {
        for edge in graph.graph.edges_directed(node, Direction::Incoming) {
            let class = edge.source();
            if matches!(edge.weight(), EdgeKind::Inheritance { .. })
                && !changed_nodes.contains(&class)
                && subclasses.insert(class)
            {
                frontier.push(class);
            }
        }
    }

    let mut affected = BTreeSet::new();

    for &node in changed_nodes.iter().chain(&subclasses) {
        for edge in graph.graph.edges_directed(node, Direction::Incoming) {
            if edge.weight().is_derived() {
                add_owner(graph, edge.source(), &mut affected);
            }
        }
    }

    for edge in graph.graph.edge_references() {
        if let EdgeKind::ImportResolution { via } = edge.weight()
            && via.iter().any(|hop| changed_nodes.contains(hop))
        {
            add_owner(graph, edge.source(), &mut affected);
        }
    }

    let modules = wildcard_closure(graph, modules);
    for idx in graph.graph.node_indices() {
        let relevant = match &graph.graph[idx] {
            GraphNode::Unresolved {
                file,
                reason: UnresolvedReason::MissingMember { module },
                ..
            } => {
                if modules.iter().any(|m| names_module(module, m)) {
                    affected.insert(file.clone());
                }
                false
            }
            GraphNode::ExternalModule(ext) => modules
                .iter()
                .any(|m| names_module(&ext.module, m) || ext.dotted() == *m),
            _ => false,
        };
        if relevant {
            for edge in graph.graph.edges_directed(idx, Direction::Incoming) {
                add_owner(graph, edge.source(), &mut affected);
            }
        }
    }

    for path in changed {
        affected.remove(path);
    }
    affected
}

fn add_owner(graph: &WorkspaceGraph, node: NodeIndex, out: &mut BTreeSet<PathBuf>) {
    if let Some(owner) = graph.owner_file(node) {
        out.insert(owner.to_path_buf());
    }
}

/// Merge `changes` into a copy of `old` and re-resolve every file they affect.
///
/// `old` is left untouched; the caller publishes the returned graph. Structure is merged
/// single-threaded, then resolution of the rebuilt files runs on `pool` against the
/// merged graph and its edges are materialized.
pub(crate) fn apply_changes(
    old: &WorkspaceGraph,
    changes: Vec<LoadedChange>,
    pool: &rayon::ThreadPool,
) -> (WorkspaceGraph, RebuildReport) {
    let changed: Vec<PathBuf> = changes.iter().map(|c| c.path().to_path_buf()).collect();

    let mut modules: HashSet<String> = HashSet::new();
    for change in &changes {
        if let Some(info) = old.file(change.path()) {
            modules.insert(info.module.clone());
        }
        if let LoadedChange::Upsert { info, .. } = change {
            modules.insert(info.module.clone());
        }
    }
    modules.remove("");

    let affected = affected_files(old, &changed, &modules);
    tracing::debug!(changed = changed.len(), affected = affected.len(), "rebuilding");

    let mut graph = old.clone();
    let mut carry = CarryPool::default();

    for change in &changes {
        let next = match change {
            LoadedChange::Upsert { parsed, .. } => parsed.as_ref(),
            LoadedChange::Delete(_) => None,
        };
        graph.release_file(change.path(), next, &mut carry);
    }
    for path in &affected {
        graph.clear_resolution(path);
    }
    for change in changes {
        match change {
            LoadedChange::Upsert { info, parsed } => graph.install_file(info, parsed, &mut carry),
            LoadedChange::Delete(path) => graph.remove_file(&path),
        }
    }
    graph.drop_unclaimed(carry);
    graph.reindex();

    let rebuilt: Vec<PathBuf> = changed
        .iter()
        .cloned()
        .chain(affected)
        .filter(|p| graph.contains_file(p))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // Bases first: member lookups in the second pass follow inheritance edges.
    let bases: Vec<_> = pool.install(|| {
        rebuilt
            .par_iter()
            .filter_map(|path| resolver::resolve_bases(&graph, path))
            .collect()
    });
    for resolution in bases {
        resolver::apply_bases(&mut graph, resolution);
    }

    let resolutions: Vec<_> = pool.install(|| {
        rebuilt
            .par_iter()
            .filter_map(|path| resolver::resolve_file(&graph, path))
            .collect()
    });

    let mut stats = ResolveStats::default();
    for resolution in resolutions {
        stats += resolver::apply(&mut graph, resolution);
    }
    graph.collect_externals();

    (graph, RebuildReport { rebuilt, stats })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::GraphConfig;
    use crate::graph::edge::UsageKind;
    use crate::indexer::{BuildContext, FileChange, build, load_changes};
    use crate::storage::{FileMeta, MemoryStorage};

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    fn upsert(path: &str, text: &str) -> FileChange {
        FileChange::Upsert {
            path: PathBuf::from(path),
            bytes: text.as_bytes().to_vec(),
            meta: FileMeta::default(),
        }
    }

    fn commit(old: &WorkspaceGraph, changes: Vec<FileChange>) -> (WorkspaceGraph, RebuildReport) {
        let ctx = BuildContext::new(Path::new("/w"), GraphConfig::default());
        let pool = pool();
        let loaded = load_changes(&ctx, &pool, changes, None);
        apply_changes(old, loaded, &pool)
    }

    fn initial(files: &[(&str, &str)]) -> WorkspaceGraph {
        let storage = files
            .iter()
            .fold(MemoryStorage::new(), |s, (p, t)| s.with_file(*p, t));
        let ctx = BuildContext::new(Path::new("/w"), GraphConfig::default());
        build(&storage, &ctx, &pool(), None)
    }

    #[test]
    fn test_importers_are_rebuilt_with_the_changed_file() {
        let old = initial(&[
            ("/w/a.py", "def helper():\n    pass\n"),
            ("/w/b.py", "from a import helper\n\ndef use():\n    helper()\n"),
            ("/w/c.py", "def alone():\n    pass\n"),
        ]);
        let (new, report) = commit(&old, vec![upsert("/w/a.py", "X = 1\n\ndef helper():\n    return X\n")]);

        assert_eq!(report.rebuilt, vec![PathBuf::from("/w/a.py"), PathBuf::from("/w/b.py")]);
        let helper = new.get_symbol_in(Path::new("/w/a.py"), "helper").unwrap();
        let users = new.usages(helper.id, UsageKind::any()).unwrap();
        assert!(users.iter().any(|s| s.name == "use"), "b.use still reaches helper");
    }

    #[test]
    fn test_created_module_fixes_missing_import() {
        let old = initial(&[("/w/b.py", "from a import helper\n")]);
        assert_eq!(old.unresolved(Path::new("/w/b.py")).unwrap().len(), 0, "a is external before it exists");

        let (new, report) = commit(&old, vec![upsert("/w/a.py", "def helper():\n    pass\n")]);
        assert!(report.rebuilt.contains(&PathBuf::from("/w/b.py")));
        let helper = new.get_symbol_in(Path::new("/w/a.py"), "helper").unwrap();
        assert_eq!(new.usages(helper.id, UsageKind::any()).unwrap().len(), 1);
        assert!(
            !new.externals.keys().any(|e| e.module == "a"),
            "the stale external is collected"
        );
    }

    #[test]
    fn test_deleted_file_leaves_missing_import() {
        let old = initial(&[
            ("/w/a.py", "def helper():\n    pass\n"),
            ("/w/b.py", "import a\n\ndef use():\n    a.helper()\n"),
        ]);
        let (new, _) = commit(&old, vec![FileChange::Delete(PathBuf::from("/w/a.py"))]);
        assert!(!new.contains_file(Path::new("/w/a.py")));
        assert!(new.get_symbol("helper").is_err());
        let use_fn = new.get_symbol("use").unwrap();
        let deps = new.dependencies(use_fn.id, UsageKind::any()).unwrap();
        assert!(deps.iter().all(|d| d.file.as_deref() != Some(Path::new("/w/a.py"))));
        assert!(
            deps.iter().any(|d| d.file.is_none() && d.qualified_name == "a.helper"),
            "a.helper is now an external member"
        );
    }

    #[test]
    fn test_wildcard_reexport_chain_is_rebuilt() {
        let old = initial(&[
            ("/w/a.py", "Y = 1\n"),
            ("/w/b.py", "from a import *\n"),
            ("/w/c.py", "from b import x\n\ndef f():\n    return x\n"),
        ]);
        assert_eq!(old.unresolved(Path::new("/w/c.py")).unwrap().len(), 1);

        let (new, report) = commit(&old, vec![upsert("/w/a.py", "Y = 1\n\ndef x():\n    pass\n")]);
        assert!(report.rebuilt.contains(&PathBuf::from("/w/c.py")), "{:?}", report.rebuilt);
        assert!(new.unresolved(Path::new("/w/c.py")).unwrap().is_empty());
        let x = new.get_symbol_in(Path::new("/w/a.py"), "x").unwrap();
        let users = new.usages(x.id, UsageKind::any()).unwrap();
        assert!(users.iter().any(|s| s.name == "f"), "c.f reaches a.x through b");
    }

    #[test]
    fn test_base_gaining_member_rebuilds_subclass_users() {
        let old = initial(&[
            ("/w/a.py", "class Base:\n    pass\n"),
            ("/w/b.py", "from a import Base\n\nclass Child(Base):\n    pass\n"),
            ("/w/c.py", "from b import Child\n\ndef main():\n    Child.run(None)\n"),
        ]);
        let (new, report) = commit(
            &old,
            vec![upsert("/w/a.py", "class Base:\n    def run(self):\n        pass\n")],
        );
        assert!(report.rebuilt.contains(&PathBuf::from("/w/c.py")), "{:?}", report.rebuilt);
        let run = new.get_symbol("Base.run").unwrap();
        let users = new.usages(run.id, UsageKind::CHAINED).unwrap();
        assert_eq!(users.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["main"]);
    }

    #[test]
    fn test_names_module() {
        assert!(names_module("pkg", "pkg"));
        assert!(names_module("pkg", "pkg.sub"));
        assert!(!names_module("pk", "pkg.sub"));
        assert!(!names_module("pkg.sub", "pkg"));
    }
}
