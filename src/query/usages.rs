use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::error::LookupError;
use crate::graph::edge::{EdgeKind, UsageKind};
use crate::graph::node::{GraphNode, Span, SymbolId};
use crate::graph::{Symbol, WorkspaceGraph};

/// One incoming usage edge: who uses the symbol, how, and where.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UsageRecord {
    pub source: Symbol,
    pub kinds: UsageKind,
    /// Reference sites in the source's file.
    pub sites: Vec<Span>,
}

fn by_location(a: &Symbol, b: &Symbol) -> std::cmp::Ordering {
    (&a.file, a.span.start, a.id).cmp(&(&b.file, b.span.start, b.id))
}

impl WorkspaceGraph {
    /// Usage edges leaving (`Outgoing`) or entering (`Incoming`) `node` whose kinds
    /// intersect `mask`, as (other end, payload) pairs.
    fn usage_neighbours(
        &self,
        node: NodeIndex,
        direction: Direction,
        mask: UsageKind,
    ) -> impl Iterator<Item = (NodeIndex, &crate::graph::edge::UsageEdge)> + '_ {
        self.graph
            .edges_directed(node, direction)
            .filter_map(move |edge| match edge.weight() {
                EdgeKind::Usage(usage) if usage.kinds.intersects(mask) => {
                    let other = match direction {
                        Direction::Outgoing => edge.target(),
                        Direction::Incoming => edge.source(),
                    };
                    Some((other, usage))
                }
                _ => None,
            })
    }

    /// Symbols using `id` through at least one of the `kinds`.
    ///
    /// The inverse of [`Self::dependencies`]: `a` is in `usages(b)` exactly when `b` is in
    /// `dependencies(a)` for the same mask.
    pub fn usages(&self, id: SymbolId, kinds: UsageKind) -> Result<Vec<Symbol>, LookupError> {
        self.symbol(id)?;
        let mut seen = HashSet::new();
        let mut out: Vec<Symbol> = self
            .usage_neighbours(id.index(), Direction::Incoming, kinds)
            .filter(|(n, _)| seen.insert(*n))
            .filter_map(|(n, _)| self.to_symbol(n))
            .collect();
        out.sort_by(by_location);
        Ok(out)
    }

    /// Symbols `id` uses through at least one of the `kinds`. Unresolved references are
    /// not symbols and are left out.
    pub fn dependencies(&self, id: SymbolId, kinds: UsageKind) -> Result<Vec<Symbol>, LookupError> {
        self.symbol(id)?;
        Ok(self.direct_dependencies(id.index(), kinds))
    }

    fn direct_dependencies(&self, node: NodeIndex, kinds: UsageKind) -> Vec<Symbol> {
        let mut seen = HashSet::new();
        let mut out: Vec<Symbol> = self
            .usage_neighbours(node, Direction::Outgoing, kinds)
            .filter(|(n, _)| seen.insert(*n))
            .filter_map(|(n, _)| self.to_symbol(n))
            .collect();
        out.sort_by(by_location);
        out
    }

    /// Incoming usage edges of `id` with their kinds and reference sites.
    pub fn usage_edges(&self, id: SymbolId, kinds: UsageKind) -> Result<Vec<UsageRecord>, LookupError> {
        self.symbol(id)?;
        let mut out: Vec<UsageRecord> = self
            .usage_neighbours(id.index(), Direction::Incoming, kinds)
            .filter_map(|(n, usage)| {
                Some(UsageRecord {
                    source: self.to_symbol(n)?,
                    kinds: usage.kinds,
                    sites: usage.sites.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| by_location(&a.source, &b.source));
        Ok(out)
    }

    /// Names `id` references that did not resolve.
    pub fn unresolved_dependencies(&self, id: SymbolId) -> Result<Vec<String>, LookupError> {
        self.symbol(id)?;
        Ok(self
            .graph
            .edges_directed(id.index(), Direction::Outgoing)
            .filter(|e| matches!(e.weight(), EdgeKind::Usage(_)))
            .filter_map(|e| match &self.graph[e.target()] {
                GraphNode::Unresolved { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect())
    }

    /// Transitive dependencies of `id`, breadth-first.
    ///
    /// Returns every reached symbol (starting with `id` itself) mapped to its direct
    /// dependencies, in the order symbols were reached. Symbols at `max_depth` are listed
    /// with their dependencies but not expanded further; `None` means unbounded. Every
    /// symbol is expanded at most once.
    pub fn dependencies_within(
        &self,
        id: SymbolId,
        kinds: UsageKind,
        max_depth: Option<usize>,
    ) -> Result<IndexMap<SymbolId, Vec<Symbol>>, LookupError> {
        self.symbol(id)?;
        let mut out: IndexMap<SymbolId, Vec<Symbol>> = IndexMap::new();
        let mut visited: HashSet<NodeIndex> = HashSet::from([id.index()]);
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(id.index(), 0)]);

        while let Some((node, depth)) = queue.pop_front() {
            let deps = self.direct_dependencies(node, kinds);
            if max_depth.is_none_or(|max| depth < max) {
                for dep in &deps {
                    if visited.insert(dep.id.index()) {
                        queue.push_back((dep.id.index(), depth + 1));
                    }
                }
            }
            out.insert(SymbolId(node), deps);
        }
        Ok(out)
    }
}
