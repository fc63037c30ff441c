use bitflags::bitflags;
use petgraph::stable_graph::NodeIndex;

use super::node::Span;

bitflags! {
    /// How a usage reaches its target. An edge may carry several classifications when the
    /// same symbol is reached through different forms of reference.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct UsageKind: u8 {
        /// Same-file definition, or an import statement naming its target.
        const DIRECT = 0b0001;
        /// Member access through a module import or a local object: `mod.f`, `Cls.m`.
        const CHAINED = 0b0010;
        /// Through a non-aliased import of a symbol defined elsewhere.
        const INDIRECT = 0b0100;
        /// Through an aliased import (`import x as y`, `from m import x as y`).
        const ALIASED = 0b1000;
    }
}

impl UsageKind {
    /// Every classification; the default filter for usage/dependency queries.
    pub fn any() -> Self {
        Self::all()
    }
}

/// Payload of a `Usage` edge.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UsageEdge {
    pub kinds: UsageKind,
    /// Reference sites in the source symbol's file.
    pub sites: Vec<Span>,
}

/// The kind of directed edge between two nodes in the workspace graph.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EdgeKind {
    /// File -> top-level Symbol or Statement.
    Contains,
    /// Nested Symbol/Statement -> enclosing Symbol.
    ChildOf,
    /// Symbol -> referenced Symbol, ExternalModule or Unresolved sentinel.
    Usage(UsageEdge),
    /// Import Symbol -> resolved definition (Symbol, File, ExternalModule or Unresolved).
    /// `via` lists the intermediate import symbols walked through re-export hops.
    ImportResolution { via: Vec<NodeIndex> },
    /// Export Symbol (`__all__` entry) -> exported Symbol.
    Export,
    /// Class -> direct base, `position` is the index in the base list.
    Inheritance { position: usize },
}

impl EdgeKind {
    pub fn usage_kinds(&self) -> Option<UsageKind> {
        match self {
            EdgeKind::Usage(u) => Some(u.kinds),
            _ => None,
        }
    }

    /// True for edges computed by the usage index (as opposed to structural ones).
    pub fn is_derived(&self) -> bool {
        !matches!(self, EdgeKind::Contains | EdgeKind::ChildOf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_kind_mask_filtering() {
        let edge = UsageKind::DIRECT | UsageKind::ALIASED;
        assert!(edge.intersects(UsageKind::ALIASED));
        assert!(edge.intersects(UsageKind::DIRECT | UsageKind::CHAINED));
        assert!(!edge.intersects(UsageKind::INDIRECT | UsageKind::CHAINED));
        assert!(edge.intersects(UsageKind::any()));
    }

    #[test]
    fn test_structural_edges_are_not_derived() {
        assert!(!EdgeKind::Contains.is_derived());
        assert!(!EdgeKind::ChildOf.is_derived());
        assert!(EdgeKind::Export.is_derived());
        assert!(EdgeKind::Inheritance { position: 0 }.is_derived());
    }
}
