pub mod edge;
pub mod node;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;

use crate::error::{LookupError, ParseError};
use crate::parser::references::{ClassBases, LocalImport, Reference};
use crate::parser::{ParsedFile, symbols::ExtractedSymbol};

use edge::{EdgeKind, UsageKind};
use node::{
    ExternalModuleInfo, FileInfo, GraphNode, Span, StatementInfo, SymbolId, SymbolInfo,
    SymbolKind, UnresolvedReason,
};

// ---------------------------------------------------------------------------
// Public views
// ---------------------------------------------------------------------------

/// A symbol as returned by queries: a snapshot of the node, detached from the graph.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    /// Dotted path inside the file (`Service.run`); `module.name` for external symbols.
    pub qualified_name: String,
    pub kind: SymbolKind,
    /// Defining file. `None` for external symbols.
    pub file: Option<PathBuf>,
    pub span: Span,
    pub parent: Option<SymbolId>,
}

/// A reference made outside any symbol (a module-level statement such as `helper()`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileReference {
    /// The referenced name as written (`helper`, `mod.helper`).
    pub name: String,
    /// `None` when the reference did not resolve.
    pub target: Option<SymbolId>,
    pub kinds: UsageKind,
    pub site: Span,
}

/// A module-level name bound more than once. The first binding in resolution order wins.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AmbiguousBinding {
    pub file: PathBuf,
    pub name: String,
    pub candidates: Vec<SymbolId>,
    pub chosen: SymbolId,
}

/// An unresolved reference or import recorded for a file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UnresolvedName {
    pub name: String,
    pub reason: UnresolvedReason,
}

/// Counts describing one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphSummary {
    pub generation: u64,
    pub files: usize,
    pub parse_errors: usize,
    pub symbols: usize,
    pub symbols_by_kind: BTreeMap<&'static str, usize>,
    pub statements: usize,
    pub usage_edges: usize,
    pub externals: usize,
    pub unresolved: usize,
    pub ambiguities: usize,
}

// ---------------------------------------------------------------------------
// Per-file bookkeeping
// ---------------------------------------------------------------------------

/// Resolver inputs of one file, kept so the file can be re-resolved without a re-parse.
/// Symbol indices inside refer to `FileEntry::symbols`.
#[derive(Debug, Default)]
pub(crate) struct FileExtract {
    pub references: Vec<Reference>,
    pub bases: Vec<ClassBases>,
    pub local_imports: Vec<LocalImport>,
}

#[derive(Debug, Clone)]
pub(crate) struct FileEntry {
    pub node: NodeIndex,
    /// Symbol nodes in extraction (source) order.
    pub symbols: Vec<NodeIndex>,
    pub statements: Vec<NodeIndex>,
    /// `Unresolved` sentinels owned by this file.
    pub sentinels: Vec<NodeIndex>,
    pub extract: Arc<FileExtract>,
    pub references: Vec<FileReference>,
    pub ambiguities: Vec<AmbiguousBinding>,
}

/// Identity of a symbol across re-parses.
pub(crate) type SymbolKey = (String, SymbolKind);

/// Symbol nodes released by the files of one commit, claimable by any file of that commit.
#[derive(Debug, Default)]
pub(crate) struct CarryPool {
    released: HashMap<SymbolKey, Vec<NodeIndex>>,
    /// Nodes kept for the file they came from, keyed with their occurrence ordinal.
    retained: HashMap<PathBuf, HashMap<(SymbolKey, usize), NodeIndex>>,
    orphans: Vec<NodeIndex>,
}

impl CarryPool {
    fn take_released(&mut self, key: &SymbolKey) -> Option<NodeIndex> {
        let nodes = self.released.get_mut(key)?;
        let node = nodes.pop();
        if nodes.is_empty() {
            self.released.remove(key);
        }
        node
    }

    /// Nodes nobody claimed.
    fn into_leftovers(self) -> Vec<NodeIndex> {
        let mut out = self.orphans;
        out.extend(self.released.into_values().flatten());
        for nodes in self.retained.into_values() {
            out.extend(nodes.into_values());
        }
        out
    }
}

fn keyed_with_ordinals<'a>(
    infos: impl Iterator<Item = &'a SymbolInfo>,
) -> Vec<(SymbolKey, usize)> {
    let mut seen: HashMap<SymbolKey, usize> = HashMap::new();
    infos
        .map(|info| {
            let key = (info.qualified_name.clone(), info.kind);
            let ordinal = seen.entry(key.clone()).or_insert(0);
            let out = (key, *ordinal);
            *ordinal += 1;
            out
        })
        .collect()
}

// ---------------------------------------------------------------------------
// WorkspaceGraph
// ---------------------------------------------------------------------------

/// All nodes and edges of one committed workspace state.
///
/// A value of this type is never mutated once published: commits build a new graph from a
/// clone and swap it in. Readers hold an `Arc<WorkspaceGraph>`.
#[derive(Debug, Clone)]
pub struct WorkspaceGraph {
    pub(crate) graph: StableGraph<GraphNode, EdgeKind>,
    pub(crate) root: PathBuf,
    pub(crate) generation: u64,
    pub(crate) files: BTreeMap<PathBuf, FileEntry>,
    /// Dotted module path -> file.
    pub(crate) module_index: HashMap<String, PathBuf>,
    /// Symbol name -> nodes bearing that name, across all files.
    pub(crate) name_index: HashMap<String, Vec<NodeIndex>>,
    pub(crate) externals: HashMap<ExternalModuleInfo, NodeIndex>,
}

impl WorkspaceGraph {
    /// Create an empty graph for a workspace root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            graph: StableGraph::new(),
            root: root.into(),
            generation: 0,
            files: BTreeMap::new(),
            module_index: HashMap::new(),
            name_index: HashMap::new(),
            externals: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bumped by every commit that changes at least one file.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Every indexed file, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn file(&self, path: &Path) -> Option<&FileInfo> {
        let entry = self.files.get(path)?;
        self.graph[entry.node].as_file()
    }

    /// Current text of a file as of this snapshot.
    pub fn text(&self, path: &Path) -> Option<&str> {
        self.file(path).map(|f| &*f.text)
    }

    pub fn parse_error(&self, path: &Path) -> Option<&ParseError> {
        self.file(path)?.parse_error.as_ref()
    }

    pub fn file_for_module(&self, module: &str) -> Option<&Path> {
        self.module_index.get(module).map(PathBuf::as_path)
    }

    /// Symbols of a file in source order, nested ones included.
    pub fn file_symbols(&self, path: &Path) -> Result<Vec<Symbol>, LookupError> {
        let entry = self.entry(path)?;
        Ok(entry
            .symbols
            .iter()
            .filter_map(|&idx| self.to_symbol(idx))
            .collect())
    }

    /// Top-level statements and the direct statements of def/class bodies, by span.
    pub fn statements(&self, path: &Path) -> Result<Vec<StatementInfo>, LookupError> {
        let entry = self.entry(path)?;
        Ok(entry
            .statements
            .iter()
            .filter_map(|&idx| match &self.graph[idx] {
                GraphNode::Statement(info) => Some(info.clone()),
                _ => None,
            })
            .collect())
    }

    /// References made outside any symbol.
    pub fn file_references(&self, path: &Path) -> Result<&[FileReference], LookupError> {
        Ok(&self.entry(path)?.references)
    }

    /// Every flagged ambiguous binding, by file.
    pub fn ambiguities(&self) -> Vec<&AmbiguousBinding> {
        self.files.values().flat_map(|e| e.ambiguities.iter()).collect()
    }

    /// Unresolved names recorded for a file.
    pub fn unresolved(&self, path: &Path) -> Result<Vec<UnresolvedName>, LookupError> {
        let entry = self.entry(path)?;
        Ok(entry
            .sentinels
            .iter()
            .filter_map(|&idx| match &self.graph[idx] {
                GraphNode::Unresolved { name, reason, .. } => Some(UnresolvedName {
                    name: name.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect())
    }

    /// Look a symbol up by id. Fails for ids of nodes removed by a later commit.
    pub fn symbol(&self, id: SymbolId) -> Result<Symbol, LookupError> {
        self.to_symbol(id.index())
            .ok_or(LookupError::StaleSymbol { id })
    }

    /// Direct children of a class (methods, attributes, nested classes).
    pub fn children(&self, id: SymbolId) -> Result<Vec<Symbol>, LookupError> {
        self.symbol(id)?;
        let mut children: Vec<Symbol> = self
            .graph
            .edges_directed(id.index(), Direction::Incoming)
            .filter(|e| matches!(e.weight(), EdgeKind::ChildOf))
            .filter_map(|e| self.to_symbol(e.source()))
            .collect();
        children.sort_by_key(|s| s.span.start);
        Ok(children)
    }

    pub fn summary(&self) -> GraphSummary {
        let mut summary = GraphSummary {
            generation: self.generation,
            files: self.files.len(),
            ..Default::default()
        };
        for idx in self.graph.node_indices() {
            match &self.graph[idx] {
                GraphNode::File(info) => {
                    if info.parse_error.is_some() {
                        summary.parse_errors += 1;
                    }
                }
                GraphNode::Symbol(info) => {
                    summary.symbols += 1;
                    *summary.symbols_by_kind.entry(info.kind.as_str()).or_insert(0) += 1;
                }
                GraphNode::Statement(_) => summary.statements += 1,
                GraphNode::ExternalModule(_) => summary.externals += 1,
                GraphNode::Unresolved { .. } => summary.unresolved += 1,
            }
        }
        summary.usage_edges = self
            .graph
            .edge_weights()
            .filter(|w| matches!(w, EdgeKind::Usage(_)))
            .count();
        summary.ambiguities = self.files.values().map(|e| e.ambiguities.len()).sum();
        summary
    }

    // -----------------------------------------------------------------------
    // Crate-internal accessors
    // -----------------------------------------------------------------------

    pub(crate) fn entry(&self, path: &Path) -> Result<&FileEntry, LookupError> {
        self.files.get(path).ok_or_else(|| LookupError::UnknownFile {
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn symbol_info(&self, idx: NodeIndex) -> Option<&SymbolInfo> {
        self.graph.node_weight(idx)?.as_symbol()
    }

    pub(crate) fn is_package(&self, path: &Path) -> bool {
        matches!(
            path.file_stem().and_then(|s| s.to_str()),
            Some("__init__")
        )
    }

    pub(crate) fn parent_of(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .find(|e| matches!(e.weight(), EdgeKind::ChildOf))
            .map(|e| e.target())
    }

    /// Child symbols of `idx` named `name`.
    pub(crate) fn child_named(&self, idx: NodeIndex, name: &str) -> Option<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| matches!(e.weight(), EdgeKind::ChildOf))
            .map(|e| e.source())
            .filter(|&c| self.symbol_info(c).is_some_and(|s| s.name == name))
            .collect();
        children.sort_by_key(|&c| self.symbol_info(c).map(|s| s.span.start));
        children.into_iter().next()
    }

    pub(crate) fn to_symbol(&self, idx: NodeIndex) -> Option<Symbol> {
        match self.graph.node_weight(idx)? {
            GraphNode::Symbol(info) => Some(Symbol {
                id: SymbolId(idx),
                name: info.name.clone(),
                qualified_name: info.qualified_name.clone(),
                kind: info.kind,
                file: Some(info.file.clone()),
                span: info.span,
                parent: self.parent_of(idx).map(SymbolId),
            }),
            GraphNode::ExternalModule(ext) => Some(Symbol {
                id: SymbolId(idx),
                name: ext.declared_name().to_owned(),
                qualified_name: ext.dotted(),
                kind: SymbolKind::ExternalModule,
                file: None,
                span: Span::default(),
                parent: None,
            }),
            _ => None,
        }
    }

    /// The file owning a node, if it is owned by one.
    pub(crate) fn owner_file(&self, idx: NodeIndex) -> Option<&Path> {
        match self.graph.node_weight(idx)? {
            GraphNode::File(info) => Some(&info.path),
            GraphNode::Symbol(info) => Some(&info.file),
            GraphNode::Statement(info) => Some(&info.file),
            GraphNode::Unresolved { file, .. } => Some(file),
            GraphNode::ExternalModule(_) => None,
        }
    }

    // -----------------------------------------------------------------------
    // Mutation (commit-time only)
    // -----------------------------------------------------------------------

    /// Drop every derived edge leaving the file's nodes, its sentinels and its file-level
    /// references. Structure (symbols, statements, containment) is kept.
    pub(crate) fn clear_resolution(&mut self, path: &Path) {
        let Some(entry) = self.files.get_mut(path) else {
            return;
        };
        let sentinels = std::mem::take(&mut entry.sentinels);
        entry.references.clear();
        entry.ambiguities.clear();
        let sources: Vec<NodeIndex> = entry.symbols.clone();

        for node in sentinels {
            self.graph.remove_node(node);
        }
        for source in sources {
            let derived: Vec<_> = self
                .graph
                .edges_directed(source, Direction::Outgoing)
                .filter(|e| e.weight().is_derived())
                .map(|e| e.id())
                .collect();
            for edge in derived {
                self.graph.remove_edge(edge);
            }
        }
    }

    /// Detach a changed file's structure ahead of [`Self::install_file`].
    ///
    /// Symbols whose `(qualified_name, kind)` survives in `next` are retained for this file;
    /// the others are released into `pool`, where another file of the same commit may claim
    /// them (a move). Statements and sentinels are removed outright.
    pub(crate) fn release_file(
        &mut self,
        path: &Path,
        next: Option<&ParsedFile>,
        pool: &mut CarryPool,
    ) {
        self.clear_resolution(path);
        let Some(entry) = self.files.get_mut(path) else {
            return;
        };
        let statements = std::mem::take(&mut entry.statements);
        let symbols = std::mem::take(&mut entry.symbols);

        for node in statements {
            self.graph.remove_node(node);
        }

        let next_keys: HashSet<(SymbolKey, usize)> = next
            .map(|p| keyed_with_ordinals(p.symbols.iter().map(|s| &s.info)).into_iter().collect())
            .unwrap_or_default();
        let old_keys = keyed_with_ordinals(symbols.iter().filter_map(|&n| self.graph[n].as_symbol()));

        let retained = pool.retained.entry(path.to_path_buf()).or_default();
        for (node, full_key) in symbols.into_iter().zip(old_keys) {
            // Structural edges are rebuilt by `install_file`.
            let structural: Vec<_> = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .chain(self.graph.edges_directed(node, Direction::Outgoing))
                .filter(|e| matches!(e.weight(), EdgeKind::Contains | EdgeKind::ChildOf))
                .map(|e| e.id())
                .collect();
            for edge in structural {
                self.graph.remove_edge(edge);
            }

            if next_keys.contains(&full_key) {
                retained.insert(full_key, node);
            } else {
                pool.released.entry(full_key.0).or_default().push(node);
            }
        }
    }

    /// Insert or refresh a file and its parsed structure, reusing retained or released
    /// symbol nodes where the identity matches.
    pub(crate) fn install_file(
        &mut self,
        info: FileInfo,
        parsed: Option<ParsedFile>,
        pool: &mut CarryPool,
    ) {
        let path = info.path.clone();
        let file_node = match self.files.get(&path) {
            Some(entry) => {
                let node = entry.node;
                self.graph[node] = GraphNode::File(info);
                node
            }
            None => self.graph.add_node(GraphNode::File(info)),
        };

        let parsed = parsed.unwrap_or_default();
        let keys = keyed_with_ordinals(parsed.symbols.iter().map(|s| &s.info));
        let mut retained = pool.retained.remove(&path).unwrap_or_default();

        let mut symbol_nodes: Vec<NodeIndex> = Vec::with_capacity(parsed.symbols.len());
        for (ExtractedSymbol { info, parent }, full_key) in parsed.symbols.into_iter().zip(keys) {
            let reused = retained
                .remove(&full_key)
                .or_else(|| pool.take_released(&full_key.0));
            let node = match reused {
                Some(node) => {
                    self.graph[node] = GraphNode::Symbol(info);
                    node
                }
                None => self.graph.add_node(GraphNode::Symbol(info)),
            };
            match parent.and_then(|p| symbol_nodes.get(p).copied()) {
                Some(parent_node) => {
                    self.graph.add_edge(node, parent_node, EdgeKind::ChildOf);
                }
                None => {
                    self.graph.add_edge(file_node, node, EdgeKind::Contains);
                }
            }
            symbol_nodes.push(node);
        }
        pool.orphans.extend(retained.into_values());

        let mut statement_nodes = Vec::with_capacity(parsed.statements.len());
        let mut by_name: HashMap<String, NodeIndex> = HashMap::new();
        for &node in &symbol_nodes {
            if let Some(info) = self.symbol_info(node)
                && matches!(info.kind, SymbolKind::Function | SymbolKind::Class)
            {
                by_name.entry(info.qualified_name.clone()).or_insert(node);
            }
        }
        for statement in parsed.statements {
            let parent = statement.parent.as_ref().and_then(|p| by_name.get(p).copied());
            let node = self.graph.add_node(GraphNode::Statement(statement));
            match parent {
                Some(p) => self.graph.add_edge(node, p, EdgeKind::ChildOf),
                None => self.graph.add_edge(file_node, node, EdgeKind::Contains),
            };
            statement_nodes.push(node);
        }

        let extract = Arc::new(FileExtract {
            references: parsed.references,
            bases: parsed.bases,
            local_imports: parsed.local_imports,
        });
        self.files.insert(
            path,
            FileEntry {
                node: file_node,
                symbols: symbol_nodes,
                statements: statement_nodes,
                sentinels: Vec::new(),
                extract,
                references: Vec::new(),
                ambiguities: Vec::new(),
            },
        );
    }

    /// Remove a deleted file's node. Its symbols must already be released.
    pub(crate) fn remove_file(&mut self, path: &Path) {
        if let Some(entry) = self.files.remove(path) {
            self.graph.remove_node(entry.node);
        }
    }

    /// Delete every node left unclaimed after a commit's files were installed.
    pub(crate) fn drop_unclaimed(&mut self, pool: CarryPool) {
        for node in pool.into_leftovers() {
            self.graph.remove_node(node);
        }
    }

    pub(crate) fn external_node(&mut self, info: ExternalModuleInfo) -> NodeIndex {
        if let Some(&idx) = self.externals.get(&info) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::ExternalModule(info.clone()));
        self.externals.insert(info, idx);
        idx
    }

    /// Remove external nodes nothing points at any more.
    pub(crate) fn collect_externals(&mut self) {
        let orphans: Vec<ExternalModuleInfo> = self
            .externals
            .iter()
            .filter(|(_, idx)| {
                self.graph
                    .edges_directed(**idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|(info, _)| info.clone())
            .collect();
        for info in orphans {
            if let Some(idx) = self.externals.remove(&info) {
                self.graph.remove_node(idx);
            }
        }
    }

    pub(crate) fn add_sentinel(&mut self, path: &Path, name: String, reason: UnresolvedReason) -> NodeIndex {
        let idx = self.graph.add_node(GraphNode::Unresolved {
            file: path.to_path_buf(),
            name,
            reason,
        });
        if let Some(entry) = self.files.get_mut(path) {
            entry.sentinels.push(idx);
        }
        idx
    }

    /// Rebuild the module and name indexes from the file table.
    pub(crate) fn reindex(&mut self) {
        self.module_index.clear();
        self.name_index.clear();
        for (path, entry) in &self.files {
            if let Some(info) = self.graph[entry.node].as_file()
                && !info.module.is_empty()
            {
                // `pkg.py` and `pkg/__init__.py` both claim `pkg`; the first (sorted) wins.
                self.module_index
                    .entry(info.module.clone())
                    .or_insert_with(|| path.clone());
            }
            for &node in &entry.symbols {
                if let Some(info) = self.graph[node].as_symbol() {
                    self.name_index.entry(info.name.clone()).or_default().push(node);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageKind;
    use crate::parser::parse_file;
    use crate::storage::FileMeta;

    fn file_info(path: &str, module: &str, text: &str) -> FileInfo {
        FileInfo {
            path: PathBuf::from(path),
            language: LanguageKind::Python,
            module: module.to_owned(),
            text: Arc::from(text),
            meta: FileMeta::default(),
            parse_error: None,
        }
    }

    fn install(graph: &mut WorkspaceGraph, pool: &mut CarryPool, path: &str, module: &str, text: &str) {
        let parsed = parse_file(Path::new(path), text).unwrap();
        graph.install_file(file_info(path, module, text), Some(parsed), pool);
    }

    fn id_of(graph: &WorkspaceGraph, path: &str, name: &str) -> SymbolId {
        graph
            .file_symbols(Path::new(path))
            .unwrap()
            .into_iter()
            .find(|s| s.name == name)
            .map(|s| s.id)
            .unwrap_or_else(|| panic!("{name} not found in {path}"))
    }

    #[test]
    fn test_install_file_builds_structure() {
        let mut graph = WorkspaceGraph::new("/w");
        let mut pool = CarryPool::default();
        install(&mut graph, &mut pool, "/w/a.py", "a", "class A:\n    def run(self):\n        pass\n\nX = 1\n");
        graph.reindex();

        let symbols = graph.file_symbols(Path::new("/w/a.py")).unwrap();
        let names: Vec<_> = symbols.iter().map(|s| s.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["A", "A.run", "X"]);

        let run = &symbols[1];
        assert_eq!(run.parent, Some(symbols[0].id), "method is a child of its class");
        assert_eq!(graph.children(symbols[0].id).unwrap().len(), 1);
        let statements = graph.statements(Path::new("/w/a.py")).unwrap();
        assert_eq!(statements.len(), 4, "class, method, method body and X");
        assert_eq!(statements.iter().filter(|s| s.parent.is_none()).count(), 2);
        assert_eq!(graph.file_for_module("a"), Some(Path::new("/w/a.py")));
        assert_eq!(graph.summary().symbols, 3);
    }

    #[test]
    fn test_reparse_keeps_surviving_ids() {
        let mut graph = WorkspaceGraph::new("/w");
        let mut pool = CarryPool::default();
        install(&mut graph, &mut pool, "/w/a.py", "a", "def keep():\n    pass\n\ndef gone():\n    pass\n");
        let keep = id_of(&graph, "/w/a.py", "keep");
        let gone = id_of(&graph, "/w/a.py", "gone");

        let text = "X = 1\n\ndef keep():\n    return 2\n";
        let parsed = parse_file(Path::new("/w/a.py"), text).unwrap();
        let mut pool = CarryPool::default();
        graph.release_file(Path::new("/w/a.py"), Some(&parsed), &mut pool);
        graph.install_file(file_info("/w/a.py", "a", text), Some(parsed), &mut pool);
        graph.drop_unclaimed(pool);

        assert_eq!(id_of(&graph, "/w/a.py", "keep"), keep, "surviving symbol keeps its id");
        assert!(graph.symbol(gone).is_err(), "vanished symbol is removed");
    }

    #[test]
    fn test_moved_symbol_keeps_id_across_files() {
        let mut graph = WorkspaceGraph::new("/w");
        let mut pool = CarryPool::default();
        install(&mut graph, &mut pool, "/w/a.py", "a", "def helper():\n    pass\n");
        let helper = id_of(&graph, "/w/a.py", "helper");

        let a_text = "";
        let c_text = "def helper():\n    pass\n";
        let a_parsed = parse_file(Path::new("/w/a.py"), a_text).unwrap();
        let c_parsed = parse_file(Path::new("/w/c.py"), c_text).unwrap();

        let mut pool = CarryPool::default();
        graph.release_file(Path::new("/w/a.py"), Some(&a_parsed), &mut pool);
        graph.release_file(Path::new("/w/c.py"), Some(&c_parsed), &mut pool);
        graph.install_file(file_info("/w/a.py", "a", a_text), Some(a_parsed), &mut pool);
        graph.install_file(file_info("/w/c.py", "c", c_text), Some(c_parsed), &mut pool);
        graph.drop_unclaimed(pool);

        assert_eq!(id_of(&graph, "/w/c.py", "helper"), helper);
        assert_eq!(
            graph.symbol(helper).unwrap().file.as_deref(),
            Some(Path::new("/w/c.py"))
        );
        assert!(graph.file_symbols(Path::new("/w/a.py")).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_file_lookup() {
        let graph = WorkspaceGraph::new("/w");
        assert!(matches!(
            graph.file_symbols(Path::new("/w/missing.py")),
            Err(LookupError::UnknownFile { .. })
        ));
    }
}
