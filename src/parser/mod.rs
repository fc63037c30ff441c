pub mod imports;
pub mod languages;
pub mod references;
pub mod symbols;

use std::cell::RefCell;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tree_sitter::{Node, Parser, Tree};

use crate::error::ParseError;
use crate::graph::node::StatementInfo;
use crate::language::LanguageKind;

use languages::language_for;
use references::{ClassBases, LocalImport, Reference, extract_references};
use symbols::{ExtractedSymbol, extract_structure};

// Thread-local Parser instance: one per rayon worker thread, zero lock contention.
// Initialised lazily on first use; `None` if the grammar failed to load.
thread_local! {
    static PARSER_PY: RefCell<Option<Parser>> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&language_for(LanguageKind::Python)).ok().map(|_| p)
    });
}

/// The result of parsing a single source file.
///
/// - `symbols`: definitions, imports and `__all__` entries in source order
/// - `statements`: module-level statements and the direct statements of every def/class body
/// - `references`: every module-visible name load with its enclosing symbol
/// - `bases`: the base-class list of every class symbol
/// - `local_imports`: import statements inside function bodies
///
/// The tree-sitter `Tree` is NOT retained: trees are dropped after extraction and every
/// edit re-parses from text.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub symbols: Vec<ExtractedSymbol>,
    pub statements: Vec<StatementInfo>,
    pub references: Vec<Reference>,
    pub bases: Vec<ClassBases>,
    pub local_imports: Vec<LocalImport>,
}

/// Parse a source file and extract its symbols, statements and references.
///
/// Uses the calling thread's parser, so it is cheap to call from a rayon pool.
///
/// # Parameters
/// - `path`: path to the file (used for grammar selection and recorded on every symbol)
/// - `source`: the file's UTF-8 text
///
/// # Errors
/// Returns a [`ParseError`] if:
/// - the extension is not a supported grammar
/// - the text contains a syntax error (the first `ERROR`/`MISSING` node is reported)
/// - tree-sitter fails to produce a tree
pub fn parse_file(path: &Path, source: &str) -> Result<ParsedFile, ParseError> {
    if LanguageKind::from_path(path).is_none() {
        return Err(ParseError::UnsupportedLanguage {
            path: path.to_path_buf(),
        });
    }

    let tree = parse_tree(path, source).map_err(|err| ParseError::Parser {
        path: path.to_path_buf(),
        message: format!("{err:#}"),
    })?;

    let root = tree.root_node();
    if root.has_error() {
        let (line, column) = first_error(root)
            .map(|n| (n.start_position().row + 1, n.start_position().column + 1))
            .unwrap_or((1, 1));
        return Err(ParseError::Syntax {
            path: path.to_path_buf(),
            line,
            column,
        });
    }

    let bytes = source.as_bytes();
    let structure = extract_structure(root, bytes, path);
    let refs = extract_references(root, bytes, &structure.symbols);

    Ok(ParsedFile {
        symbols: structure.symbols,
        statements: structure.statements,
        references: refs.references,
        bases: refs.bases,
        local_imports: refs.local_imports,
    })
}

fn parse_tree(path: &Path, source: &str) -> Result<Tree> {
    PARSER_PY
        .with(|cell| {
            let mut slot = cell.borrow_mut();
            let parser = slot
                .as_mut()
                .ok_or_else(|| anyhow!("the Python grammar could not be loaded"))?;
            parser
                .parse(source.as_bytes(), None)
                .ok_or_else(|| anyhow!("tree-sitter returned no tree"))
        })
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Depth-first search for the first error or missing node.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::SymbolKind;

    #[test]
    fn test_parse_file_collects_everything() {
        let src = "from a import helper\n\nclass B(A):\n    def run(self):\n        import json\n        return helper(json)\n";
        let parsed = parse_file(Path::new("/w/b.py"), src).unwrap();

        let kinds: Vec<_> = parsed.symbols.iter().map(|s| s.info.kind).collect();
        assert_eq!(
            kinds,
            vec![SymbolKind::Import, SymbolKind::Class, SymbolKind::Function]
        );
        assert_eq!(parsed.bases.len(), 1);
        assert_eq!(parsed.local_imports.len(), 1);
        assert!(
            parsed.references.iter().any(|r| r.head().name == "helper"),
            "call inside the method is a reference"
        );
        assert_eq!(parsed.statements.len(), 5);
    }

    #[test]
    fn test_syntax_error_is_reported_with_position() {
        let err = parse_file(Path::new("/w/bad.py"), "def ok():\n    pass\n\ndef broken(:\n").unwrap_err();
        match err {
            ParseError::Syntax { line, .. } => assert_eq!(line, 4),
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_file(Path::new("/w/notes.txt"), "x = 1").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn test_parse_in_parallel() {
        use rayon::prelude::*;
        let results: Vec<_> = (0..16)
            .into_par_iter()
            .map(|i| parse_file(Path::new("/w/m.py"), &format!("def f{i}():\n    pass\n")))
            .collect();
        assert!(results.iter().all(|r| r.as_ref().is_ok_and(|p| p.symbols.len() == 1)));
    }
}
