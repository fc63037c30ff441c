pub(crate) mod imports;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use petgraph::stable_graph::NodeIndex;

use crate::graph::edge::{EdgeKind, UsageEdge, UsageKind};
use crate::graph::node::{ExternalModuleInfo, GraphNode, Span, SymbolId, SymbolKind, UnresolvedReason};
use crate::graph::{AmbiguousBinding, FileEntry, FileReference, WorkspaceGraph};
use crate::parser::imports::{ImportInfo, ImportStyle};
use crate::parser::languages::is_builtin;
use crate::parser::references::{Reference, Segment};

use imports::{Bindings, Target, member_of, module_bindings, resolve_import};

/// Statistics collected while resolving a set of files.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    pub files: usize,
    /// Usage edges added (after merging per source/target pair).
    pub usages: usize,
    pub imports_resolved: usize,
    pub imports_external: usize,
    pub imports_unresolved: usize,
    pub unresolved_references: usize,
}

impl std::ops::AddAssign for ResolveStats {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.usages += other.usages;
        self.imports_resolved += other.imports_resolved;
        self.imports_external += other.imports_external;
        self.imports_unresolved += other.imports_unresolved;
        self.unresolved_references += other.unresolved_references;
    }
}

/// One classified reference site.
#[derive(Debug, Clone)]
struct Hit {
    /// Index into the file's symbol list; `None` for module-level code.
    source: Option<usize>,
    target: Target,
    kind: UsageKind,
    site: Span,
    /// The text covered by `site`, as a dotted name.
    text: String,
}

/// Everything resolved for one file, computed against an immutable graph.
#[derive(Debug)]
pub(crate) struct FileResolution {
    path: PathBuf,
    hits: Vec<Hit>,
    imports: Vec<(usize, Target, Vec<NodeIndex>)>,
    exports: Vec<(usize, Target)>,
    ambiguities: Vec<AmbiguousBinding>,
}

/// Base classes of one file. Materialized before any file's references are resolved,
/// so member lookups can follow inheritance edges across files.
#[derive(Debug)]
pub(crate) struct BaseResolution {
    path: PathBuf,
    /// (class symbol index, position in the base list, target)
    bases: Vec<(usize, usize, Target)>,
}

// ---------------------------------------------------------------------------
// Phase 2a: resolution (read-only, runs in parallel)
// ---------------------------------------------------------------------------

struct FileResolver<'g> {
    graph: &'g WorkspaceGraph,
    entry: &'g FileEntry,
    bindings: Bindings,
    /// Resolved target of every module-level import symbol of the file.
    import_targets: HashMap<NodeIndex, Target>,
}

/// Resolve the base classes of every class in `path`.
pub(crate) fn resolve_bases(graph: &WorkspaceGraph, path: &Path) -> Option<BaseResolution> {
    let (resolver, _) = FileResolver::new(graph, path)?;
    let mut bases = Vec::new();
    for class_bases in &resolver.entry.extract.bases {
        for base in &class_bases.bases {
            let reference = Reference {
                chain: base.chain.clone(),
                scope: Some(class_bases.class),
                class_body: None,
            };
            let mut base_hits = Vec::new();
            resolver.resolve_reference(&reference, &mut base_hits);
            if let Some(target) = resolver.final_target(&base_hits) {
                bases.push((class_bases.class, base.position, target));
            }
        }
    }
    Some(BaseResolution {
        path: path.to_path_buf(),
        bases,
    })
}

/// Resolve every import, reference and export of `path`.
///
/// Expects the inheritance edges of the workspace to be in place (see [`resolve_bases`]).
pub(crate) fn resolve_file(graph: &WorkspaceGraph, path: &Path) -> Option<FileResolution> {
    let (mut resolver, imports) = FileResolver::new(graph, path)?;
    let entry = resolver.entry;
    let mut hits = Vec::new();

    for (idx, target, _) in &imports {
        if let Some(import) = resolver.symbol_import(*idx) {
            hits.push(Hit {
                source: Some(*idx),
                target: target.clone(),
                kind: UsageKind::DIRECT,
                site: import.name_span,
                text: import.member.clone().unwrap_or_else(|| import.module.clone()),
            });
        }
    }

    for reference in &entry.extract.references {
        resolver.resolve_reference(reference, &mut hits);
    }

    let mut exports = Vec::new();
    for (idx, &node) in entry.symbols.iter().enumerate() {
        let Some(export) = graph.symbol_info(node).and_then(|s| s.export.as_ref()) else {
            continue;
        };
        let synthetic = Reference {
            chain: vec![Segment {
                name: export.entry.clone(),
                span: export.content_span,
            }],
            scope: Some(idx),
            class_body: None,
        };
        let mut export_hits = Vec::new();
        resolver.resolve_reference(&synthetic, &mut export_hits);
        // Only the binding itself counts as used by the export.
        if let Some(first) = export_hits.first() {
            hits.push(Hit {
                kind: UsageKind::DIRECT,
                ..first.clone()
            });
        }
        if let Some(target) = resolver.final_target(&export_hits) {
            exports.push((idx, target));
        }
    }

    Some(FileResolution {
        path: path.to_path_buf(),
        hits,
        imports,
        exports,
        ambiguities: std::mem::take(&mut resolver.bindings.ambiguities),
    })
}

impl<'g> FileResolver<'g> {
    /// A resolver for `path`, plus the resolved target and hops of each import symbol.
    #[allow(clippy::type_complexity)]
    fn new(graph: &'g WorkspaceGraph, path: &Path) -> Option<(Self, Vec<(usize, Target, Vec<NodeIndex>)>)> {
        let entry = graph.files.get(path)?;
        let bindings = module_bindings(graph, path);

        let mut imports = Vec::new();
        let mut import_targets = HashMap::new();
        for (idx, &node) in entry.symbols.iter().enumerate() {
            let Some(import) = graph.symbol_info(node).and_then(|s| s.import.as_ref()) else {
                continue;
            };
            let (target, via) = resolve_import(graph, path, import);
            import_targets.insert(node, target.clone());
            imports.push((idx, target, via));
        }

        let resolver = FileResolver {
            graph,
            entry,
            bindings,
            import_targets,
        };
        Some((resolver, imports))
    }

    fn symbol_import(&self, idx: usize) -> Option<&'g ImportInfo> {
        let node = *self.entry.symbols.get(idx)?;
        self.graph.symbol_info(node)?.import.as_ref()
    }

    fn is_import_node(&self, target: &Target) -> bool {
        match target {
            Target::Node(n) => self.graph.symbol_info(*n).is_some_and(|s| s.kind == SymbolKind::Import),
            _ => false,
        }
    }

    fn is_class(&self, node: NodeIndex) -> bool {
        self.graph.symbol_info(node).is_some_and(|s| s.kind == SymbolKind::Class)
    }

    fn is_file(&self, target: &Target) -> bool {
        match target {
            Target::Node(n) => self.graph.graph.node_weight(*n).is_some_and(|w| w.as_file().is_some()),
            _ => false,
        }
    }

    /// The definition a chain finally lands on: the last hit that is not an import symbol.
    fn final_target(&self, hits: &[Hit]) -> Option<Target> {
        hits.iter()
            .rev()
            .find(|h| !self.is_import_node(&h.target))
            .map(|h| h.target.clone())
    }

    fn hit(&self, reference: &Reference, k: usize, target: Target, kind: UsageKind, out: &mut Vec<Hit>) {
        out.push(Hit {
            source: reference.scope,
            target,
            kind,
            site: reference.prefix_span(k),
            text: reference.dotted(k),
        });
    }

    /// `Class.member` where segment `j` names a member of `class` or of one of its ancestors.
    fn class_member(&self, reference: &Reference, class: NodeIndex, j: usize, out: &mut Vec<Hit>) {
        if j >= reference.chain.len() || !self.is_class(class) {
            return;
        }
        if let Some((_, member)) = self.graph.inherited_member(class, &reference.chain[j].name) {
            self.hit(reference, j, Target::Node(member), UsageKind::CHAINED, out);
            self.class_member(reference, member, j + 1, out);
        }
    }

    /// Segment `j` accessed as a member of a module target.
    fn module_member(&self, reference: &Reference, module: &Target, j: usize, out: &mut Vec<Hit>) {
        if j >= reference.chain.len() {
            return;
        }
        let Some(target) = member_of(self.graph, module, &reference.chain[j].name) else {
            return;
        };
        if self.is_file(&target) {
            // `pkg.sub.f`: keep walking into the submodule.
            self.module_member(reference, &target, j + 1, out);
            return;
        }
        if let Target::Node(node) = target {
            self.hit(reference, j, Target::Node(node), UsageKind::CHAINED, out);
            self.class_member(reference, node, j + 1, out);
        } else {
            self.hit(reference, j, target, UsageKind::CHAINED, out);
        }
    }

    /// Hits for a reference whose first `k + 1` segments are bound by `import`.
    fn through_import(
        &self,
        reference: &Reference,
        import: &ImportInfo,
        import_node: Option<NodeIndex>,
        target: &Target,
        k: usize,
        out: &mut Vec<Hit>,
    ) {
        if let Some(node) = import_node {
            self.hit(reference, k, Target::Node(node), UsageKind::DIRECT, out);
        }
        match import.style {
            ImportStyle::Module => self.module_member(reference, target, k + 1, out),
            ImportStyle::From => {
                if self.is_file(target) {
                    self.module_member(reference, target, k + 1, out);
                    return;
                }
                let kind = if import.is_aliased() {
                    UsageKind::ALIASED
                } else {
                    UsageKind::INDIRECT
                };
                self.hit(reference, k, target.clone(), kind, out);
                if let Target::Node(node) = target {
                    self.class_member(reference, *node, k + 1, out);
                }
            }
            ImportStyle::Wildcard => {}
        }
    }

    /// Number of leading segments bound by `import`, minus one.
    fn bound_prefix(reference: &Reference, import: &ImportInfo) -> Option<usize> {
        match import.style {
            ImportStyle::Module if !import.is_aliased() => (0..reference.chain.len())
                .rev()
                .find(|&k| reference.dotted(k) == import.module),
            ImportStyle::Wildcard => None,
            _ => (reference.head().name == import.binding_name()).then_some(0),
        }
    }

    fn resolve_reference(&self, reference: &Reference, out: &mut Vec<Hit>) {
        let head = &reference.head().name;

        if let Some(class_idx) = reference.class_body
            && let Some(&class) = self.entry.symbols.get(class_idx)
            && let Some(member) = self.graph.child_named(class, head)
        {
            self.hit(reference, 0, Target::Node(member), UsageKind::DIRECT, out);
            return;
        }

        if let Some(scope) = reference.scope {
            for local in self.entry.extract.local_imports.iter().filter(|l| l.scope == scope) {
                if let Some(k) = Self::bound_prefix(reference, &local.import) {
                    let (target, _) = resolve_import(self.graph, self.path(), &local.import);
                    self.through_import(reference, &local.import, None, &target, k, out);
                    return;
                }
            }
        }

        // Longest dotted prefix first so `import a.b` wins over a plain `a` for `a.b.f`.
        for k in (0..reference.chain.len()).rev() {
            let name = if k == 0 { head.clone() } else { reference.dotted(k) };
            let Some(&node) = self.bindings.names.get(&name) else {
                continue;
            };
            let Some(info) = self.graph.symbol_info(node) else {
                continue;
            };
            match &info.import {
                Some(import) => {
                    if Self::bound_prefix(reference, import) != Some(k) {
                        continue;
                    }
                    let target = self.import_targets.get(&node).cloned().unwrap_or(Target::Unresolved {
                        name: name.clone(),
                        reason: UnresolvedReason::UnknownName,
                    });
                    self.through_import(reference, import, Some(node), &target, k, out);
                }
                None if k == 0 => {
                    self.hit(reference, 0, Target::Node(node), UsageKind::DIRECT, out);
                    self.class_member(reference, node, 1, out);
                }
                None => continue,
            }
            return;
        }

        for &wildcard in &self.bindings.wildcards {
            let Some(module) = self.import_targets.get(&wildcard) else {
                continue;
            };
            let Some(target) = member_of(self.graph, module, head) else {
                continue;
            };
            if !target.is_resolved() || self.is_file(&target) {
                continue;
            }
            self.hit(reference, 0, Target::Node(wildcard), UsageKind::DIRECT, out);
            self.hit(reference, 0, target.clone(), UsageKind::INDIRECT, out);
            if let Target::Node(node) = target {
                self.class_member(reference, node, 1, out);
            }
            return;
        }

        if is_builtin(head) {
            let target = Target::External(ExternalModuleInfo {
                module: "builtins".to_owned(),
                name: Some(head.clone()),
            });
            self.hit(reference, 0, target, UsageKind::INDIRECT, out);
            return;
        }

        let target = Target::Unresolved {
            name: head.clone(),
            reason: UnresolvedReason::UnknownName,
        };
        self.hit(reference, 0, target, UsageKind::DIRECT, out);
    }

    fn path(&self) -> &'g Path {
        self.graph
            .graph
            .node_weight(self.entry.node)
            .and_then(|w| w.as_file())
            .map(|f| f.path.as_path())
            .unwrap_or_else(|| Path::new(""))
    }
}

// ---------------------------------------------------------------------------
// Phase 2b: materialization (single-threaded)
// ---------------------------------------------------------------------------

struct Materializer {
    path: PathBuf,
    sentinels: HashMap<(String, UnresolvedReason), NodeIndex>,
}

impl Materializer {
    /// Reuses the sentinels already recorded for `path`.
    fn new(graph: &WorkspaceGraph, path: &Path) -> Self {
        let mut sentinels = HashMap::new();
        for &node in graph.files.get(path).map(|e| e.sentinels.as_slice()).unwrap_or_default() {
            if let Some(GraphNode::Unresolved { name, reason, .. }) = graph.graph.node_weight(node) {
                sentinels.entry((name.clone(), reason.clone())).or_insert(node);
            }
        }
        Self {
            path: path.to_path_buf(),
            sentinels,
        }
    }

    fn node(&mut self, graph: &mut WorkspaceGraph, target: &Target) -> NodeIndex {
        match target {
            Target::Node(node) => *node,
            Target::External(info) => graph.external_node(info.clone()),
            Target::Unresolved { name, reason } => *self
                .sentinels
                .entry((name.clone(), reason.clone()))
                .or_insert_with(|| graph.add_sentinel(&self.path, name.clone(), reason.clone())),
        }
    }
}

/// Write a file's resolution into the graph as edges, file references and ambiguities.
pub(crate) fn apply(graph: &mut WorkspaceGraph, resolution: FileResolution) -> ResolveStats {
    let mut stats = ResolveStats {
        files: 1,
        ..Default::default()
    };
    let Some(symbols) = graph.files.get(&resolution.path).map(|e| e.symbols.clone()) else {
        return stats;
    };
    let mut materializer = Materializer::new(graph, &resolution.path);

    let mut usages: IndexMap<(NodeIndex, NodeIndex), UsageEdge> = IndexMap::new();
    let mut file_refs = Vec::new();
    for hit in resolution.hits {
        let target = materializer.node(graph, &hit.target);
        let is_file = matches!(graph.graph.node_weight(target), Some(GraphNode::File(_)));
        if is_file {
            continue;
        }
        if matches!(hit.target, Target::Unresolved { .. }) {
            stats.unresolved_references += 1;
        }
        match hit.source.and_then(|i| symbols.get(i).copied()) {
            Some(source) => {
                let edge = usages.entry((source, target)).or_insert_with(|| UsageEdge {
                    kinds: UsageKind::empty(),
                    sites: Vec::new(),
                });
                edge.kinds |= hit.kind;
                if !edge.sites.contains(&hit.site) {
                    edge.sites.push(hit.site);
                }
            }
            None => file_refs.push(FileReference {
                name: hit.text,
                target: match &hit.target {
                    Target::Unresolved { .. } => None,
                    _ => Some(SymbolId(target)),
                },
                kinds: hit.kind,
                site: hit.site,
            }),
        }
    }
    stats.usages = usages.len();
    for ((source, target), mut edge) in usages {
        edge.sites.sort();
        graph.graph.add_edge(source, target, EdgeKind::Usage(edge));
    }

    for (idx, target, via) in resolution.imports {
        let Some(&source) = symbols.get(idx) else {
            continue;
        };
        match &target {
            Target::Node(_) => stats.imports_resolved += 1,
            Target::External(_) => stats.imports_external += 1,
            Target::Unresolved { .. } => stats.imports_unresolved += 1,
        }
        let node = materializer.node(graph, &target);
        graph.graph.add_edge(source, node, EdgeKind::ImportResolution { via });
    }

    for (idx, target) in resolution.exports {
        let Some(&source) = symbols.get(idx) else {
            continue;
        };
        let node = materializer.node(graph, &target);
        if graph.graph[node].as_file().is_none() {
            graph.graph.add_edge(source, node, EdgeKind::Export);
        }
    }

    if let Some(entry) = graph.files.get_mut(&resolution.path) {
        file_refs.sort_by_key(|r: &FileReference| r.site);
        entry.references = file_refs;
        entry.ambiguities = resolution.ambiguities;
    }
    stats
}

/// Write a file's base classes into the graph as inheritance edges.
pub(crate) fn apply_bases(graph: &mut WorkspaceGraph, resolution: BaseResolution) {
    let Some(symbols) = graph.files.get(&resolution.path).map(|e| e.symbols.clone()) else {
        return;
    };
    let mut materializer = Materializer::new(graph, &resolution.path);
    for (idx, position, target) in resolution.bases {
        let Some(&source) = symbols.get(idx) else {
            continue;
        };
        let node = materializer.node(graph, &target);
        if graph.graph[node].as_file().is_none() {
            graph.graph.add_edge(source, node, EdgeKind::Inheritance { position });
        }
    }
}
