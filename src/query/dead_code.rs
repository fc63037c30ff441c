use std::collections::HashSet;
use std::path::Path;

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::graph::edge::EdgeKind;
use crate::graph::node::{SymbolInfo, SymbolKind};
use crate::graph::{Symbol, WorkspaceGraph};

// ---------------------------------------------------------------------------
// Entry-point detection helpers
// ---------------------------------------------------------------------------

/// Returns true if the symbol is reachable from outside the graph's view.
///
/// Exclusion rules:
/// - dunder names (`__init__`, `__all__`), which the runtime calls
/// - functions named `main`
/// - `test_*` names and anything inside a test file
fn is_entry_point_symbol(sym: &SymbolInfo) -> bool {
    if sym.name.starts_with("__") && sym.name.ends_with("__") {
        return true;
    }
    if sym.name == "main" && sym.kind == SymbolKind::Function {
        return true;
    }
    if sym.name.starts_with("test_") || sym.name.starts_with("Test") {
        return true;
    }
    is_test_file(&sym.file)
}

fn is_test_file(path: &Path) -> bool {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    file_name.starts_with("test_")
        || file_name.ends_with("_test.py")
        || file_name == "conftest.py"
        || path
            .components()
            .any(|c| matches!(c.as_os_str().to_str(), Some("tests" | "test")))
}

impl WorkspaceGraph {
    /// Function, class and variable definitions nothing refers to.
    ///
    /// A definition counts as referenced if any other symbol uses it (self-references and
    /// references from its own members do not count), if module-level code names it, or if
    /// an `__all__` entry exports it. Entry points are never reported.
    pub fn unreferenced_symbols(&self) -> Vec<Symbol> {
        let file_referenced: HashSet<NodeIndex> = self
            .files
            .values()
            .flat_map(|e| e.references.iter())
            .filter_map(|r| r.target.map(|id| id.index()))
            .collect();

        let mut out = Vec::new();
        for entry in self.files.values() {
            for &node in &entry.symbols {
                let Some(info) = self.symbol_info(node) else {
                    continue;
                };
                if !matches!(info.kind, SymbolKind::Function | SymbolKind::Class | SymbolKind::Variable)
                    || is_entry_point_symbol(info)
                    || file_referenced.contains(&node)
                    || self.is_used_from_outside(node)
                {
                    continue;
                }
                if let Some(symbol) = self.to_symbol(node) {
                    out.push(symbol);
                }
            }
        }
        out
    }

    fn is_used_from_outside(&self, node: NodeIndex) -> bool {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .any(|e| match e.weight() {
                EdgeKind::Usage(_) => !self.is_within(e.source(), node),
                EdgeKind::Export => true,
                _ => false,
            })
    }

    /// True if `node` is `ancestor` or nested inside it.
    pub(crate) fn is_within(&self, node: NodeIndex, ancestor: NodeIndex) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent_of(n);
        }
        false
    }
}
