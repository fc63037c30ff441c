use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{LookupError, RenameError};
use crate::graph::node::{SymbolId, SymbolKind};
use crate::parser::imports::ImportStyle;
use crate::parser::languages::KEYWORDS;
use crate::resolver::imports::binding;
use crate::transaction::{EditBatch, Transaction};

use super::{importers_of, reference_sites};

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
        && !KEYWORDS.contains(&name)
}

impl Transaction<'_> {
    /// Rename a definition and every reference to it.
    ///
    /// Rewritten: the definition's name, reference sites of usages (the last segment of
    /// `module.name` and `Class.name` accesses), module-level references, the imported
    /// name of every import of the symbol, uses through non-aliased imports, and `__all__`
    /// entries. Uses through an alias keep the alias.
    ///
    /// # Errors
    /// - [`RenameError::InvalidName`] if `new_name` is not an identifier or is a keyword
    /// - [`RenameError::RenameConflict`] if `new_name` is already bound where the symbol is
    ///   defined, or in a file importing it without an alias
    /// - [`RenameError::PendingEdits`] if a file to rewrite has staged edits
    pub fn rename(&mut self, symbol: SymbolId, new_name: &str) -> Result<(), RenameError> {
        let graph = Arc::clone(self.snapshot());
        graph.symbol(symbol)?;
        let node = symbol.index();
        let info = graph
            .symbol_info(node)
            .ok_or(LookupError::StaleSymbol { id: symbol })?;
        if !matches!(info.kind, SymbolKind::Function | SymbolKind::Class | SymbolKind::Variable) {
            return Err(RenameError::UnsupportedKind {
                name: info.name.clone(),
                kind: info.kind,
            });
        }
        if !is_identifier(new_name) {
            return Err(RenameError::InvalidName {
                name: new_name.to_owned(),
            });
        }
        let old = info.name.as_str();
        if new_name == old {
            return Ok(());
        }

        let bound_in_scope = match graph.parent_of(node) {
            Some(parent) => graph.child_named(parent, new_name).is_some(),
            None => binding(&graph, &info.file, new_name).is_some(),
        };
        if bound_in_scope {
            return Err(RenameError::RenameConflict {
                name: new_name.to_owned(),
                path: info.file.clone(),
            });
        }

        let plain_importers: Vec<_> = importers_of(&graph, node)
            .into_iter()
            .filter(|&n| {
                graph
                    .symbol_info(n)
                    .and_then(|s| s.import.as_ref())
                    .is_some_and(|i| i.style == ImportStyle::From && !i.is_aliased())
            })
            .collect();
        for &importer in &plain_importers {
            let Some(import_info) = graph.symbol_info(importer) else {
                continue;
            };
            if binding(&graph, &import_info.file, new_name).is_some() {
                return Err(RenameError::RenameConflict {
                    name: new_name.to_owned(),
                    path: import_info.file.clone(),
                });
            }
        }

        let mut ranges: BTreeMap<PathBuf, BTreeSet<(usize, usize)>> = BTreeMap::new();
        ranges
            .entry(info.file.clone())
            .or_default()
            .insert((info.name_span.start, info.name_span.end));

        let dotted = format!(".{old}");
        let site_groups = std::iter::once(reference_sites(&graph, node))
            .chain(plain_importers.iter().map(|&n| reference_sites(&graph, n)));
        for group in site_groups {
            for (path, sites) in group {
                let Some(text) = graph.text(&path) else {
                    continue;
                };
                let names = ranges.entry(path.clone()).or_default();
                for (start, end) in sites {
                    let written = &text[start..end];
                    if written == old {
                        names.insert((start, end));
                    } else if written.ends_with(&dotted) {
                        names.insert((end - old.len(), end));
                    }
                }
            }
        }

        if let Some(path) = ranges.keys().find(|p| self.has_pending(p)) {
            return Err(RenameError::PendingEdits { path: path.clone() });
        }

        let mut batch = EditBatch::default();
        let mut sites = 0;
        for (path, names) in &ranges {
            for &(start, end) in names {
                batch.replace(path, start..end, new_name);
                sites += 1;
            }
        }
        tracing::debug!(symbol = %info.qualified_name, new_name, files = ranges.len(), sites, "staged rename");
        self.stage_batch(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::relocation::tests::{read, workspace};

    #[test]
    fn test_rename_across_files() {
        let (ws, storage) = workspace(&[
            ("/w/a.py", "def helper():\n    pass\n\n\n__all__ = ['helper']\n"),
            (
                "/w/b.py",
                "from a import helper\nfrom a import helper as h\nimport a\n\n\ndef run():\n    helper()\n    h()\n    a.helper()\n",
            ),
        ]);
        let helper = ws.snapshot().get_symbol("helper").unwrap();
        let mut tx = ws.transaction().unwrap();
        tx.rename(helper.id, "assist").unwrap();
        tx.commit().unwrap();

        assert_eq!(read(&storage, "/w/a.py"), "def assist():\n    pass\n\n\n__all__ = ['assist']\n");
        assert_eq!(
            read(&storage, "/w/b.py"),
            "from a import assist\nfrom a import assist as h\nimport a\n\n\ndef run():\n    assist()\n    h()\n    a.assist()\n"
        );
        let snapshot = ws.snapshot();
        let renamed = snapshot.get_symbol("assist").unwrap();
        assert_eq!(snapshot.usages(renamed.id, crate::UsageKind::any()).unwrap().len(), 4);
        assert!(snapshot.unresolved(Path::new("/w/b.py")).unwrap().is_empty());
    }

    #[test]
    fn test_rename_method_through_class() {
        let (ws, storage) = workspace(&[(
            "/w/a.py",
            "class Service:\n    def run(self):\n        pass\n\n\ndef main():\n    Service.run(None)\n",
        )]);
        let run = ws.snapshot().get_symbol("Service.run").unwrap();
        let mut tx = ws.transaction().unwrap();
        tx.rename(run.id, "start").unwrap();
        tx.commit().unwrap();
        assert_eq!(
            read(&storage, "/w/a.py"),
            "class Service:\n    def start(self):\n        pass\n\n\ndef main():\n    Service.start(None)\n"
        );
    }

    #[test]
    fn test_rename_errors() {
        let (ws, _) = workspace(&[
            ("/w/a.py", "def helper():\n    pass\n\n\ndef assist():\n    pass\n"),
            ("/w/b.py", "from a import helper\n\n\ndef aid():\n    helper()\n"),
        ]);
        let helper = ws.snapshot().get_symbol("helper").unwrap();
        let mut tx = ws.transaction().unwrap();
        for bad in ["class", "1x", "", "a-b"] {
            assert!(matches!(tx.rename(helper.id, bad), Err(RenameError::InvalidName { .. })), "{bad}");
        }
        assert!(matches!(
            tx.rename(helper.id, "assist"),
            Err(RenameError::RenameConflict { ref path, .. }) if path == Path::new("/w/a.py")
        ));
        assert!(matches!(
            tx.rename(helper.id, "aid"),
            Err(RenameError::RenameConflict { ref path, .. }) if path == Path::new("/w/b.py")
        ));
        tx.rename(helper.id, "helper").unwrap();
        assert!(tx.pending_files().is_empty(), "same name is a no-op");

        tx.insert(Path::new("/w/b.py"), 0, "# note\n").unwrap();
        assert!(matches!(tx.rename(helper.id, "support"), Err(RenameError::PendingEdits { .. })));
    }
}
