use std::collections::{HashSet, VecDeque};

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::error::LookupError;
use crate::graph::edge::EdgeKind;
use crate::graph::node::{GraphNode, SymbolId, SymbolKind};
use crate::graph::{Symbol, WorkspaceGraph};

/// Where a method lookup landed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MethodResolution {
    pub method: Symbol,
    /// The class defining `method`: the queried class itself or one of its ancestors.
    pub owner: Symbol,
}

impl WorkspaceGraph {
    fn require_class(&self, id: SymbolId) -> Result<Symbol, LookupError> {
        let symbol = self.symbol(id)?;
        if symbol.kind != SymbolKind::Class {
            return Err(LookupError::NotAClass {
                name: symbol.name,
                kind: symbol.kind,
            });
        }
        Ok(symbol)
    }

    /// Direct bases of `node` in declaration order (`Incoming`: direct subclasses).
    fn inheritance_neighbours(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut edges: Vec<(usize, NodeIndex)> = self
            .graph
            .edges_directed(node, direction)
            .filter_map(|e| match e.weight() {
                EdgeKind::Inheritance { position } => Some((
                    *position,
                    match direction {
                        Direction::Outgoing => e.target(),
                        Direction::Incoming => e.source(),
                    },
                )),
                _ => None,
            })
            .collect();
        edges.sort();
        edges.into_iter().map(|(_, n)| n).collect()
    }

    /// Breadth-first walk over inheritance edges. Every node is reported once; the start
    /// node is not reported.
    fn walk_hierarchy(&self, start: NodeIndex, direction: Direction, max_depth: Option<usize>) -> Vec<NodeIndex> {
        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(start, 0)]);
        let mut out = Vec::new();

        while let Some((node, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let mut next = self.inheritance_neighbours(node, direction);
            if direction == Direction::Incoming {
                next.sort_by_key(|&n| self.to_symbol(n).map(|s| (s.file, s.span.start)));
            }
            for n in next {
                if visited.insert(n) {
                    out.push(n);
                    queue.push_back((n, depth + 1));
                }
            }
        }
        out
    }

    /// Ancestors of a class, nearest first, bases in declaration order.
    ///
    /// External bases are reported as external symbols and not expanded. Unresolved bases
    /// are skipped. `max_depth` of `Some(1)` yields the direct bases only.
    pub fn superclasses(&self, id: SymbolId, max_depth: Option<usize>) -> Result<Vec<Symbol>, LookupError> {
        self.require_class(id)?;
        Ok(self
            .walk_hierarchy(id.index(), Direction::Outgoing, max_depth)
            .into_iter()
            .filter_map(|n| self.to_symbol(n))
            .collect())
    }

    /// Workspace classes deriving from `id`, nearest first.
    pub fn subclasses(&self, id: SymbolId, max_depth: Option<usize>) -> Result<Vec<Symbol>, LookupError> {
        self.require_class(id)?;
        Ok(self
            .walk_hierarchy(id.index(), Direction::Incoming, max_depth)
            .into_iter()
            .filter_map(|n| self.to_symbol(n))
            .collect())
    }

    /// True if the class or one of its ancestors is named `name`.
    ///
    /// `name` matches a workspace class by name, qualified name or `module.qualified_name`;
    /// an external base by its declared name or dotted path (`abc.ABC`); an unresolved base
    /// by the name written in the base list.
    pub fn is_subclass_of(&self, id: SymbolId, name: &str) -> Result<bool, LookupError> {
        self.require_class(id)?;
        let start = id.index();
        let mut nodes = vec![start];
        nodes.extend(self.walk_hierarchy(start, Direction::Outgoing, None));
        Ok(nodes.into_iter().any(|n| self.hierarchy_node_named(n, name)))
    }

    fn hierarchy_node_named(&self, node: NodeIndex, name: &str) -> bool {
        match &self.graph[node] {
            GraphNode::Symbol(info) => {
                if info.name == name || info.qualified_name == name {
                    return true;
                }
                self.file(&info.file).is_some_and(|f| {
                    name.strip_prefix(f.module.as_str())
                        .and_then(|rest| rest.strip_prefix('.'))
                        .is_some_and(|rest| rest == info.qualified_name)
                })
            }
            GraphNode::ExternalModule(ext) => ext.declared_name() == name || ext.dotted() == name,
            GraphNode::Unresolved { name: written, .. } => written == name,
            _ => false,
        }
    }

    /// Member `name` of `class`, or of the nearest ancestor defining it, with the class
    /// that supplies it. Breadth-first, bases in declaration order, first match wins.
    pub(crate) fn inherited_member(&self, class: NodeIndex, name: &str) -> Option<(NodeIndex, NodeIndex)> {
        std::iter::once(class)
            .chain(self.walk_hierarchy(class, Direction::Outgoing, None))
            .filter(|&c| self.symbol_info(c).is_some_and(|s| s.kind == SymbolKind::Class))
            .find_map(|c| self.child_named(c, name).map(|member| (c, member)))
    }

    /// Find the class that supplies member `name` for `id`: the class itself first, then
    /// its ancestors breadth-first. The first class defining the member wins.
    ///
    /// Returns `Ok(None)` when no workspace class in the hierarchy defines it.
    pub fn resolve_method(&self, id: SymbolId, name: &str) -> Result<Option<MethodResolution>, LookupError> {
        self.require_class(id)?;
        let Some((class, member)) = self.inherited_member(id.index(), name) else {
            return Ok(None);
        };
        Ok(self
            .to_symbol(member)
            .zip(self.to_symbol(class))
            .map(|(method, owner)| MethodResolution { method, owner }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tests::graph_of;

    fn names(symbols: &[Symbol]) -> Vec<&str> {
        symbols.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_superclasses_breadth_first_in_declaration_order() {
        let graph = graph_of(&[
            ("/w/base.py", "class Root:\n    def run(self):\n        pass\n\nclass Mixin:\n    pass\n"),
            (
                "/w/app.py",
                "from base import Root, Mixin\n\nclass Mid(Root):\n    pass\n\nclass Leaf(Mid, Mixin):\n    pass\n",
            ),
        ]);
        let leaf = graph.get_symbol("Leaf").unwrap();
        let all = graph.superclasses(leaf.id, None).unwrap();
        assert_eq!(names(&all), vec!["Mid", "Mixin", "Root"]);
        let direct = graph.superclasses(leaf.id, Some(1)).unwrap();
        assert_eq!(names(&direct), vec!["Mid", "Mixin"]);

        let root = graph.get_symbol("Root").unwrap();
        assert_eq!(names(&graph.subclasses(root.id, None).unwrap()), vec!["Mid", "Leaf"]);
    }

    #[test]
    fn test_cyclic_hierarchy_terminates() {
        let graph = graph_of(&[("/w/a.py", "class A(B):\n    pass\n\nclass B(A):\n    pass\n")]);
        let a = graph.get_symbol("A").unwrap();
        let ancestors = graph.superclasses(a.id, None).unwrap();
        assert_eq!(names(&ancestors), vec!["B"], "each ancestor once, the class itself never");
        assert!(graph.resolve_method(a.id, "missing").unwrap().is_none());
    }

    #[test]
    fn test_resolve_method_first_defined_wins() {
        let graph = graph_of(&[(
            "/w/a.py",
            "class Base:\n    def run(self):\n        pass\n\nclass Other:\n    def run(self):\n        pass\n\nclass Child(Base, Other):\n    def stop(self):\n        pass\n",
        )]);
        let child = graph.get_symbol("Child").unwrap();
        let found = graph.resolve_method(child.id, "run").unwrap().unwrap();
        assert_eq!(found.owner.name, "Base");
        assert_eq!(found.method.qualified_name, "Base.run");

        let own = graph.resolve_method(child.id, "stop").unwrap().unwrap();
        assert_eq!(own.owner.id, child.id);
    }

    #[test]
    fn test_is_subclass_of_external_and_unresolved() {
        let graph = graph_of(&[(
            "/w/a.py",
            "import abc\n\nclass Plugin(abc.ABC):\n    pass\n\nclass Odd(Unknown):\n    pass\n\nclass Concrete(Plugin):\n    pass\n",
        )]);
        let concrete = graph.get_symbol("Concrete").unwrap();
        assert!(graph.is_subclass_of(concrete.id, "abc.ABC").unwrap());
        assert!(graph.is_subclass_of(concrete.id, "ABC").unwrap());
        assert!(graph.is_subclass_of(concrete.id, "a.Plugin").unwrap());
        assert!(!graph.is_subclass_of(concrete.id, "Odd").unwrap());

        let odd = graph.get_symbol("Odd").unwrap();
        assert!(graph.is_subclass_of(odd.id, "Unknown").unwrap());
    }

    #[test]
    fn test_not_a_class() {
        let graph = graph_of(&[("/w/a.py", "def f():\n    pass\n")]);
        let f = graph.get_symbol("f").unwrap();
        assert!(matches!(graph.superclasses(f.id, None), Err(LookupError::NotAClass { .. })));
    }
}
