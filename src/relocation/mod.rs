//! Structured mutations: moving, renaming and deleting top-level definitions.
//!
//! Every operation plans its edits against the transaction's committed snapshot and stages
//! them as one batch. Nothing is visible in storage or the graph until the commit.

mod imports;
mod rename;

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::error::{LookupError, RelocationError, TransactionError};
use crate::graph::WorkspaceGraph;
use crate::graph::edge::EdgeKind;
use crate::graph::node::{SymbolId, SymbolInfo, SymbolKind};
use crate::language::LanguageKind;
use crate::parser::imports::ImportStyle;
use crate::resolver::imports::binding;
use crate::transaction::{EditBatch, Transaction};

use imports::{
    absolute_import, definition_removal, from_import, import_block, import_item_removal, insertion_point, line_end,
};

/// How references to a moved symbol are kept working.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RelocationStrategy {
    /// Rewrite every import of the symbol, and `module.symbol` accesses, to the new module.
    #[default]
    UpdateAllImports,
    /// Leave importers alone; the origin re-imports the symbol from its new home.
    AddBackEdge,
}

// ---------------------------------------------------------------------------
// Graph helpers
// ---------------------------------------------------------------------------

/// The outermost symbol enclosing `node` (`node` itself when top-level).
fn top_level(graph: &WorkspaceGraph, node: NodeIndex) -> NodeIndex {
    let mut current = node;
    let mut seen = HashSet::from([node]);
    while let Some(parent) = graph.parent_of(current) {
        if !seen.insert(parent) {
            break;
        }
        current = parent;
    }
    current
}

/// What an import symbol resolves to.
fn import_target(graph: &WorkspaceGraph, import: NodeIndex) -> Option<NodeIndex> {
    graph
        .graph
        .edges_directed(import, Direction::Outgoing)
        .find(|e| matches!(e.weight(), EdgeKind::ImportResolution { .. }))
        .map(|e| e.target())
}

/// Import symbols resolving to `node`, directly or through re-export hops, by file.
fn importers_of(graph: &WorkspaceGraph, node: NodeIndex) -> Vec<NodeIndex> {
    let mut out: Vec<NodeIndex> = graph
        .graph
        .edges_directed(node, Direction::Incoming)
        .filter(|e| matches!(e.weight(), EdgeKind::ImportResolution { .. }))
        .map(|e| e.source())
        .collect();
    out.sort_by_key(|&n| graph.symbol_info(n).map(|s| (s.file.clone(), s.span.start)));
    out.dedup();
    out
}

/// Symbols of `path` nested in (or equal to) `node`.
fn members(graph: &WorkspaceGraph, path: &Path, node: NodeIndex) -> Vec<NodeIndex> {
    graph
        .entry(path)
        .map(|e| e.symbols.iter().copied().filter(|&n| graph.is_within(n, node)).collect())
        .unwrap_or_default()
}

/// Top-level symbols of `path` that code inside `node` uses, in source order.
fn local_dependencies(graph: &WorkspaceGraph, path: &Path, node: NodeIndex) -> Vec<NodeIndex> {
    let mut out: BTreeSet<(usize, NodeIndex)> = BTreeSet::new();
    for member in members(graph, path, node) {
        for edge in graph.graph.edges_directed(member, Direction::Outgoing) {
            if !matches!(edge.weight(), EdgeKind::Usage(_)) {
                continue;
            }
            let target = edge.target();
            if graph.is_within(target, node) || graph.owner_file(target) != Some(path) {
                continue;
            }
            let top = top_level(graph, target);
            if let Some(info) = graph.symbol_info(top) {
                out.insert((info.span.start, top));
            }
        }
    }
    out.into_iter().map(|(_, n)| n).collect()
}

/// True if `from` reaches `to` through usages staying inside `path`.
fn reaches_within(graph: &WorkspaceGraph, path: &Path, from: NodeIndex, to: NodeIndex) -> bool {
    let mut visited = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);
    while let Some(node) = queue.pop_front() {
        for dep in local_dependencies(graph, path, node) {
            if dep == to {
                return true;
            }
            if visited.insert(dep) {
                queue.push_back(dep);
            }
        }
    }
    false
}

/// True if code of `path` outside `node` still refers to it.
fn used_outside(graph: &WorkspaceGraph, path: &Path, node: NodeIndex) -> bool {
    let by_symbol = graph
        .graph
        .edges_directed(node, Direction::Incoming)
        .filter(|e| matches!(e.weight(), EdgeKind::Usage(_) | EdgeKind::Export))
        .any(|e| graph.owner_file(e.source()) == Some(path) && !graph.is_within(e.source(), node));
    let by_module_code = graph
        .entry(path)
        .is_ok_and(|e| e.references.iter().any(|r| r.target == Some(SymbolId(node))));
    by_symbol || by_module_code
}

/// Reference sites of `node` in each file: usage edge sites plus module-level references.
fn reference_sites(graph: &WorkspaceGraph, node: NodeIndex) -> IndexMap<PathBuf, BTreeSet<(usize, usize)>> {
    let mut out: IndexMap<PathBuf, BTreeSet<(usize, usize)>> = IndexMap::new();
    for edge in graph.graph.edges_directed(node, Direction::Incoming) {
        let EdgeKind::Usage(usage) = edge.weight() else {
            continue;
        };
        if let Some(file) = graph.owner_file(edge.source()) {
            let sites = out.entry(file.to_path_buf()).or_default();
            sites.extend(usage.sites.iter().map(|s| (s.start, s.end)));
        }
    }
    for (path, entry) in &graph.files {
        for reference in &entry.references {
            if reference.target == Some(SymbolId(node)) {
                out.entry(path.clone())
                    .or_default()
                    .insert((reference.site.start, reference.site.end));
            }
        }
    }
    out.sort_keys();
    out
}

/// A movable or deletable definition: a function, class or variable at module level.
fn top_level_definition(graph: &WorkspaceGraph, id: SymbolId) -> Result<&SymbolInfo, RelocationError> {
    graph.symbol(id)?;
    let info = graph
        .symbol_info(id.index())
        .ok_or(LookupError::StaleSymbol { id })?;
    if !matches!(info.kind, SymbolKind::Function | SymbolKind::Class | SymbolKind::Variable) {
        return Err(RelocationError::UnsupportedKind {
            name: info.name.clone(),
            kind: info.kind,
        });
    }
    if info.parent.is_some() || info.conditional {
        return Err(RelocationError::NotTopLevel {
            name: info.qualified_name.clone(),
        });
    }
    Ok(info)
}

fn text_of<'g>(graph: &'g WorkspaceGraph, path: &Path) -> Result<&'g str, RelocationError> {
    graph
        .text(path)
        .ok_or_else(|| RelocationError::Lookup(LookupError::UnknownFile { path: path.to_path_buf() }))
}

// ---------------------------------------------------------------------------
// Move planning
// ---------------------------------------------------------------------------

struct MovePlan<'g> {
    graph: &'g WorkspaceGraph,
    node: NodeIndex,
    info: &'g SymbolInfo,
    origin_module: String,
    target: PathBuf,
    target_module: String,
    target_exists: bool,
    batch: EditBatch,
    /// `import <module>` statements already planned per file.
    module_imports: HashSet<PathBuf>,
}

impl<'g> MovePlan<'g> {
    fn origin(&self) -> &'g Path {
        &self.info.file
    }

    /// Imports the moved code needs in its new home, one statement per line.
    fn dependency_imports(&self) -> Vec<String> {
        let graph = self.graph;
        let origin = self.origin();
        let mut lines: IndexSet<String> = IndexSet::new();
        for dep in local_dependencies(graph, origin, self.node) {
            let Some(info) = graph.symbol_info(dep) else {
                continue;
            };
            let (bound, line) = match &info.import {
                Some(import) => match absolute_import(graph, origin, import) {
                    Some(generated) => generated,
                    None => continue,
                },
                None => (
                    info.name.clone(),
                    from_import(&self.origin_module, &info.name, None),
                ),
            };
            let from_target = info.import.as_ref().is_some_and(|i| {
                i.style != ImportStyle::Module
                    && crate::resolver::imports::import_module(graph, origin, i).as_deref()
                        == Some(self.target_module.as_str())
            });
            if from_target || (self.target_exists && binding(graph, &self.target, &bound).is_some()) {
                continue;
            }
            lines.insert(line);
        }
        lines.into_iter().collect()
    }

    fn plan_origin(&mut self, back_import: bool) -> Result<(), RelocationError> {
        let origin = self.origin();
        let text = text_of(self.graph, origin)?;
        let removal = definition_removal(text, self.info.span);
        if back_import {
            let at = insertion_point(self.graph, origin, text).min(removal.start);
            let remaining = format!("{}{}", &text[..removal.start], &text[removal.end..]);
            let line = from_import(&self.target_module, &self.info.name, None);
            self.batch.insert(origin, at, import_block(&[line], at, &remaining));
        }
        self.batch.delete(origin, removal);
        Ok(())
    }

    fn plan_target(&mut self, imports: Vec<String>) -> Result<(), RelocationError> {
        let origin_text = text_of(self.graph, self.origin())?;
        let definition = format!("{}\n", &origin_text[self.info.span.as_range()]);

        if !self.target_exists {
            let mut text = imports.iter().map(|l| format!("{l}\n")).collect::<String>();
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&definition);
            self.batch.create(&self.target, text);
            return Ok(());
        }

        let text = text_of(self.graph, &self.target)?;
        if !imports.is_empty() {
            let at = insertion_point(self.graph, &self.target, text);
            self.batch.insert(&self.target, at, import_block(&imports, at, text));
        }
        let mut appended = String::new();
        if !text.is_empty() && !text.ends_with('\n') {
            appended.push('\n');
        }
        if !text.trim().is_empty() {
            appended.push_str("\n\n");
        }
        appended.push_str(&definition);
        self.batch.insert(&self.target, text.len(), appended);

        // Imports of the symbol in its new home go away; the definition binds the name now.
        for importer in importers_of(self.graph, self.node) {
            let Some(import_info) = self.graph.symbol_info(importer) else {
                continue;
            };
            if import_info.file != self.target {
                continue;
            }
            if let Some(import) = &import_info.import {
                self.batch.delete(&self.target, import_item_removal(text, import));
            }
        }
        Ok(())
    }

    /// Point every import of the symbol at the target module.
    fn rewrite_importers(&mut self) -> Result<(), RelocationError> {
        let graph = self.graph;
        for importer in importers_of(graph, self.node) {
            let Some(info) = graph.symbol_info(importer) else {
                continue;
            };
            let Some(import) = &info.import else {
                continue;
            };
            if info.file == self.target || info.file == self.info.file || import.style != ImportStyle::From {
                continue;
            }
            let text = text_of(graph, &info.file)?;
            let line = from_import(&self.target_module, &self.info.name, Some(import.binding_name()));
            if import.names_in_statement <= 1 {
                self.batch.replace(&info.file, import.statement_span.as_range(), line);
            } else {
                self.batch.delete(&info.file, import_item_removal(text, import));
                let at = line_end(text, import.statement_span.end);
                self.batch.insert(&info.file, at, import_block(&[line], at, text));
            }
        }
        Ok(())
    }

    /// Rewrite `module.symbol` accesses, and give files that reached the symbol through a
    /// wildcard import an explicit import.
    fn rewrite_references(&mut self) -> Result<(), RelocationError> {
        let graph = self.graph;
        let named: HashSet<PathBuf> = importers_of(graph, self.node)
            .into_iter()
            .filter_map(|n| graph.symbol_info(n).map(|s| s.file.clone()))
            .collect();

        for (path, sites) in reference_sites(graph, self.node) {
            if path == self.info.file {
                continue;
            }
            let text = text_of(graph, &path)?;
            let mut plain = false;
            for (start, end) in sites {
                let written = &text[start..end];
                if !written.contains('.') {
                    plain = true;
                    continue;
                }
                if path == self.target {
                    self.batch.replace(&path, start..end, self.info.name.clone());
                } else {
                    self.batch
                        .replace(&path, start..end, format!("{}.{}", self.target_module, self.info.name));
                    self.ensure_module_import(&path, text);
                }
            }
            if plain && path != self.target && !named.contains(&path) {
                let at = insertion_point(graph, &path, text);
                let line = from_import(&self.target_module, &self.info.name, None);
                self.batch.insert(&path, at, import_block(&[line], at, text));
            }
        }
        Ok(())
    }

    fn ensure_module_import(&mut self, path: &Path, text: &str) {
        if binding(self.graph, path, &self.target_module).is_some() || !self.module_imports.insert(path.to_path_buf()) {
            return;
        }
        let at = insertion_point(self.graph, path, text);
        let line = format!("import {}", self.target_module);
        self.batch.insert(path, at, import_block(&[line], at, text));
    }
}

impl Transaction<'_> {
    /// Move a top-level definition to another file.
    ///
    /// # Parameters
    /// - `symbol`: a module-level function, class or variable
    /// - `target`: destination `.py`/`.pyi` file, created if missing; relative paths are
    ///   taken from the workspace root
    /// - `strategy`: how existing references keep working
    /// - `include_dependencies`: also give the target the imports the moved code needs
    ///
    /// # Errors
    /// - [`RelocationError::UnsupportedKind`] / [`RelocationError::NotTopLevel`]
    /// - [`RelocationError::SameFile`] / [`RelocationError::UnsupportedTarget`]
    /// - [`RelocationError::NameCollision`] if the target already binds the name
    /// - [`RelocationError::CircularRelocation`] under
    ///   [`RelocationStrategy::UpdateAllImports`] when an origin symbol the moved one
    ///   depends on depends back on it
    /// - [`RelocationError::PendingEdits`] if a file to rewrite has staged edits
    pub fn move_symbol(
        &mut self,
        symbol: SymbolId,
        target: &Path,
        strategy: RelocationStrategy,
        include_dependencies: bool,
    ) -> Result<(), RelocationError> {
        let graph = Arc::clone(self.snapshot());
        let info = top_level_definition(&graph, symbol)?;
        let node = symbol.index();

        let workspace = self.workspace();
        let target = workspace.resolve_path(target);
        if !target.starts_with(workspace.root()) {
            return Err(TransactionError::OutsideRoot { path: target }.into());
        }
        if LanguageKind::from_path(&target).is_none() {
            return Err(RelocationError::UnsupportedTarget { path: target });
        }
        if target == info.file {
            return Err(RelocationError::SameFile {
                name: info.name.clone(),
                path: target,
            });
        }
        let target_exists = graph.contains_file(&target);
        if target_exists
            && let Some(bound) = binding(&graph, &target, &info.name)
            && !(graph.symbol_info(bound).is_some_and(|s| s.kind == SymbolKind::Import)
                && import_target(&graph, bound) == Some(node))
        {
            return Err(RelocationError::NameCollision {
                name: info.name.clone(),
                path: target,
            });
        }

        if strategy == RelocationStrategy::UpdateAllImports {
            for dep in local_dependencies(&graph, &info.file, node) {
                let Some(dep_info) = graph.symbol_info(dep) else {
                    continue;
                };
                if dep_info.kind != SymbolKind::Import && reaches_within(&graph, &info.file, dep, node) {
                    return Err(RelocationError::CircularRelocation {
                        symbol: info.name.clone(),
                        via: dep_info.name.clone(),
                    });
                }
            }
        }

        let origin_module = graph.file(&info.file).map(|f| f.module.clone()).unwrap_or_default();
        let target_module = match graph.file(&target) {
            Some(file) => file.module.clone(),
            None => workspace.ctx.module_of(&target),
        };
        let mut plan = MovePlan {
            graph: &graph,
            node,
            info,
            origin_module,
            target,
            target_module,
            target_exists,
            batch: EditBatch::default(),
            module_imports: HashSet::new(),
        };

        let imports = if include_dependencies {
            plan.dependency_imports()
        } else {
            Vec::new()
        };
        let back_import = match strategy {
            RelocationStrategy::AddBackEdge => true,
            RelocationStrategy::UpdateAllImports => used_outside(&graph, &info.file, node),
        };
        plan.plan_origin(back_import)?;
        plan.plan_target(imports)?;
        if strategy == RelocationStrategy::UpdateAllImports {
            plan.rewrite_importers()?;
            plan.rewrite_references()?;
        }

        let MovePlan {
            batch, target, target_module, ..
        } = plan;
        self.check_untouched(&batch)?;
        tracing::debug!(
            symbol = %info.qualified_name,
            from = %info.file.display(),
            to = %target.display(),
            module = %target_module,
            files = batch.paths().count(),
            "staged move"
        );
        self.stage_batch(batch)?;
        Ok(())
    }

    /// Stage removal of a top-level definition. References to it are left as they are.
    pub fn delete_symbol(&mut self, symbol: SymbolId) -> Result<(), RelocationError> {
        let graph = Arc::clone(self.snapshot());
        let info = top_level_definition(&graph, symbol)?;
        let text = text_of(&graph, &info.file)?;

        let mut batch = EditBatch::default();
        batch.delete(&info.file, definition_removal(text, info.span));
        self.check_untouched(&batch)?;
        self.stage_batch(batch)?;
        Ok(())
    }

    fn check_untouched(&self, batch: &EditBatch) -> Result<(), RelocationError> {
        match batch.paths().find(|p| self.has_pending(p)) {
            Some(path) => Err(RelocationError::PendingEdits {
                path: path.to_path_buf(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::config::GraphConfig;
    use crate::storage::{MemoryStorage, Storage};
    use crate::workspace::Workspace;

    pub(crate) fn workspace(files: &[(&str, &str)]) -> (Workspace, Arc<MemoryStorage>) {
        let storage = Arc::new(
            files
                .iter()
                .fold(MemoryStorage::new(), |s, (p, t)| s.with_file(*p, t)),
        );
        let ws = Workspace::open_with("/w", storage.clone(), GraphConfig::default()).unwrap();
        (ws, storage)
    }

    pub(crate) fn read(storage: &MemoryStorage, path: &str) -> String {
        String::from_utf8(storage.read(Path::new(path)).unwrap()).unwrap()
    }

    #[test]
    fn test_move_rewrites_importers() {
        let (ws, storage) = workspace(&[
            ("/w/a.py", "def helper():\n    pass\n"),
            ("/w/b.py", "from a import helper\n\nhelper()\n"),
        ]);
        let helper = ws.snapshot().get_symbol("helper").unwrap();
        let mut tx = ws.transaction().unwrap();
        tx.move_symbol(helper.id, Path::new("c.py"), RelocationStrategy::UpdateAllImports, false)
            .unwrap();
        let changed = tx.commit().unwrap();
        assert_eq!(changed.created, vec![PathBuf::from("/w/c.py")]);

        assert_eq!(read(&storage, "/w/a.py"), "");
        assert_eq!(read(&storage, "/w/b.py"), "from c import helper\n\nhelper()\n");
        assert_eq!(read(&storage, "/w/c.py"), "def helper():\n    pass\n");

        let snapshot = ws.snapshot();
        let moved = snapshot.get_symbol("helper").unwrap();
        assert_eq!(moved.id, helper.id, "identity survives the move");
        assert_eq!(moved.file.as_deref(), Some(Path::new("/w/c.py")));
    }

    #[test]
    fn test_move_keeps_origin_working() {
        let (ws, storage) = workspace(&[
            (
                "/w/a.py",
                "import os\n\n\ndef helper():\n    return os.sep\n\n\ndef caller():\n    return helper()\n",
            ),
            ("/w/b.py", "import a\n\na.helper()\n"),
        ]);
        let helper = ws.snapshot().get_symbol("helper").unwrap();
        let mut tx = ws.transaction().unwrap();
        tx.move_symbol(helper.id, Path::new("/w/c.py"), RelocationStrategy::UpdateAllImports, true)
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(
            read(&storage, "/w/a.py"),
            "import os\nfrom c import helper\n\n\ndef caller():\n    return helper()\n"
        );
        assert_eq!(read(&storage, "/w/b.py"), "import a\nimport c\n\nc.helper()\n");
        assert_eq!(read(&storage, "/w/c.py"), "import os\n\n\ndef helper():\n    return os.sep\n");
        assert!(ws.snapshot().unresolved(Path::new("/w/b.py")).unwrap().is_empty());
    }

    #[test]
    fn test_add_back_edge_leaves_importers() {
        let (ws, storage) = workspace(&[
            ("/w/a.py", "def helper():\n    pass\n"),
            ("/w/b.py", "from a import helper\n"),
            ("/w/c.py", "X = 1\n"),
        ]);
        let helper = ws.snapshot().get_symbol("helper").unwrap();
        let mut tx = ws.transaction().unwrap();
        tx.move_symbol(helper.id, Path::new("/w/c.py"), RelocationStrategy::AddBackEdge, false)
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(read(&storage, "/w/a.py"), "from c import helper\n");
        assert_eq!(read(&storage, "/w/b.py"), "from a import helper\n");
        assert_eq!(read(&storage, "/w/c.py"), "X = 1\n\n\ndef helper():\n    pass\n");
    }

    #[test]
    fn test_circular_relocation() {
        let (ws, _) = workspace(&[(
            "/w/a.py",
            "def helper():\n    return other()\n\n\ndef other():\n    return helper()\n",
        )]);
        let helper = ws.snapshot().get_symbol("helper").unwrap();
        let mut tx = ws.transaction().unwrap();
        let err = tx
            .move_symbol(helper.id, Path::new("/w/c.py"), RelocationStrategy::UpdateAllImports, true)
            .unwrap_err();
        assert!(matches!(err, RelocationError::CircularRelocation { ref via, .. } if via == "other"));
        assert!(tx.pending_files().is_empty(), "a failed move stages nothing");

        tx.move_symbol(helper.id, Path::new("/w/c.py"), RelocationStrategy::AddBackEdge, true)
            .unwrap();
        assert_eq!(
            tx.current_text(Path::new("/w/c.py")),
            Some("from a import other\n\n\ndef helper():\n    return other()\n")
        );
    }

    #[test]
    fn test_move_validation() {
        let (ws, _) = workspace(&[
            ("/w/a.py", "class K:\n    def m(self):\n        pass\n\nif True:\n    def f():\n        pass\n"),
            ("/w/c.py", "K = 1\n"),
        ]);
        let snapshot = ws.snapshot();
        let mut tx = ws.transaction().unwrap();
        let k = snapshot.get_symbol_in(Path::new("/w/a.py"), "K").unwrap();
        let m = snapshot.get_symbol("K.m").unwrap();
        let f = snapshot.get_symbol("f").unwrap();
        let strategy = RelocationStrategy::UpdateAllImports;

        assert!(matches!(
            tx.move_symbol(m.id, Path::new("/w/b.py"), strategy, false),
            Err(RelocationError::NotTopLevel { .. })
        ));
        assert!(matches!(
            tx.move_symbol(f.id, Path::new("/w/b.py"), strategy, false),
            Err(RelocationError::NotTopLevel { .. })
        ));
        assert!(matches!(
            tx.move_symbol(k.id, Path::new("/w/a.py"), strategy, false),
            Err(RelocationError::SameFile { .. })
        ));
        assert!(matches!(
            tx.move_symbol(k.id, Path::new("/w/c.py"), strategy, false),
            Err(RelocationError::NameCollision { .. })
        ));
        assert!(matches!(
            tx.move_symbol(k.id, Path::new("/w/b.txt"), strategy, false),
            Err(RelocationError::UnsupportedTarget { .. })
        ));

        tx.insert(Path::new("/w/c.py"), 0, "# note\n").unwrap();
        tx.delete_symbol(k.id).unwrap();
        assert!(matches!(tx.delete_symbol(k.id), Err(RelocationError::PendingEdits { .. })));
    }

    #[test]
    fn test_delete_symbol() {
        let (ws, storage) = workspace(&[("/w/a.py", "X = 1\n\n\ndef gone():\n    pass\n\n\ndef kept():\n    pass\n")]);
        let gone = ws.snapshot().get_symbol("gone").unwrap();
        let mut tx = ws.transaction().unwrap();
        tx.delete_symbol(gone.id).unwrap();
        tx.commit().unwrap();
        assert_eq!(read(&storage, "/w/a.py"), "X = 1\n\n\ndef kept():\n    pass\n");
        assert!(ws.snapshot().get_symbol("gone").is_err());
    }
}
