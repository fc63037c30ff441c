pub mod dead_code;
pub mod find;
pub mod inheritance;
pub mod usages;

pub use inheritance::MethodResolution;
pub use usages::UsageRecord;

use std::path::Path;

use petgraph::stable_graph::NodeIndex;

use crate::error::LookupError;
use crate::graph::node::{SymbolId, SymbolKind};
use crate::graph::{Symbol, WorkspaceGraph};

pub(crate) fn is_definition(kind: SymbolKind) -> bool {
    matches!(kind, SymbolKind::Function | SymbolKind::Class | SymbolKind::Variable)
}

impl WorkspaceGraph {
    /// Look a symbol up by name.
    ///
    /// `name` is either a bare name (`helper`), a qualified name inside a file
    /// (`Service.run`) or a module-qualified one (`pkg.util.helper`). Definitions win over
    /// import and export bindings of the same name.
    ///
    /// # Errors
    /// - [`LookupError::NotFound`] if nothing matches
    /// - [`LookupError::Ambiguous`] if several definitions (or, absent any definition,
    ///   several other symbols) match
    pub fn get_symbol(&self, name: &str) -> Result<Symbol, LookupError> {
        let candidates: Vec<NodeIndex> = if name.contains('.') {
            self.dotted_candidates(name)
        } else {
            self.name_index.get(name).cloned().unwrap_or_default()
        };
        self.pick(name, candidates)
    }

    /// Look a symbol up by (qualified) name inside one file.
    ///
    /// Repeated definitions of one name resolve to the first, matching how the file's
    /// module-level bindings are resolved.
    pub fn get_symbol_in(&self, path: &Path, name: &str) -> Result<Symbol, LookupError> {
        let entry = self.entry(path)?;
        let matching: Vec<NodeIndex> = entry
            .symbols
            .iter()
            .copied()
            .filter(|&n| self.symbol_info(n).is_some_and(|s| s.qualified_name == name || (s.kind == SymbolKind::Import && s.name == name)))
            .collect();
        let preferred = matching
            .iter()
            .copied()
            .find(|&n| self.symbol_info(n).is_some_and(|s| is_definition(s.kind)))
            .or_else(|| matching.first().copied());
        preferred
            .and_then(|n| self.to_symbol(n))
            .ok_or_else(|| LookupError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Symbols whose qualified name, optionally prefixed by their module, equals `dotted`.
    fn dotted_candidates(&self, dotted: &str) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        for entry in self.files.values() {
            let module = self.graph[entry.node].as_file().map(|f| f.module.as_str()).unwrap_or("");
            for &node in &entry.symbols {
                let Some(info) = self.symbol_info(node) else {
                    continue;
                };
                let in_module = dotted
                    .strip_prefix(module)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(|rest| rest == info.qualified_name);
                if in_module || info.qualified_name == dotted {
                    out.push(node);
                }
            }
        }
        out
    }

    fn pick(&self, name: &str, candidates: Vec<NodeIndex>) -> Result<Symbol, LookupError> {
        let (definitions, others): (Vec<NodeIndex>, Vec<NodeIndex>) = candidates
            .into_iter()
            .partition(|&n| self.symbol_info(n).is_some_and(|s| is_definition(s.kind)));
        let pool = if definitions.is_empty() { others } else { definitions };
        match pool.as_slice() {
            [] => Err(LookupError::NotFound {
                name: name.to_owned(),
            }),
            [only] => self.to_symbol(*only).ok_or_else(|| LookupError::NotFound {
                name: name.to_owned(),
            }),
            many => {
                let mut candidates: Vec<SymbolId> = many.iter().map(|&n| SymbolId(n)).collect();
                candidates.sort();
                Err(LookupError::Ambiguous {
                    name: name.to_owned(),
                    candidates,
                })
            }
        }
    }
}
