use tree_sitter::Node;

use crate::graph::node::Span;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// The shape of an import statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ImportStyle {
    /// `import a.b` / `import a.b as c`
    Module,
    /// `from m import x` / `from m import x as y`
    From,
    /// `from m import *`
    Wildcard,
}

/// One imported name. A statement importing several names yields one `ImportInfo` each.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImportInfo {
    pub style: ImportStyle,
    /// Module path as written, leading dots included (`.utils`, `os.path`).
    pub module: String,
    /// Imported member for `from` imports.
    pub member: Option<String>,
    pub alias: Option<String>,
    /// The whole import statement.
    pub statement_span: Span,
    /// The module path token (`dotted_name` or `relative_import`).
    pub module_span: Span,
    /// The imported name token: the member for `from` imports, the dotted path otherwise.
    pub name_span: Span,
    /// The list item (`x as y` or `x`), used to drop one name from a multi-name import.
    pub item_span: Span,
    pub alias_span: Option<Span>,
    /// How many names the statement imports.
    pub names_in_statement: usize,
}

impl ImportInfo {
    /// The name this import binds in the importing module's table.
    ///
    /// Non-aliased `import a.b` binds the full dotted path so references `a.b.f` can be
    /// matched by prefix.
    pub fn binding_name(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        match self.style {
            ImportStyle::From => self.member.as_deref().unwrap_or(&self.module),
            ImportStyle::Module => &self.module,
            ImportStyle::Wildcard => "*",
        }
    }

    pub fn is_aliased(&self) -> bool {
        self.alias.is_some()
    }

    pub fn is_relative(&self) -> bool {
        self.module.starts_with('.')
    }
}

/// One string entry of a module's `__all__` list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExportInfo {
    pub entry: String,
    /// The string contents, quotes excluded.
    pub content_span: Span,
    /// The whole string literal, quotes included.
    pub literal_span: Span,
}

// ---------------------------------------------------------------------------
// Helper utilities
// ---------------------------------------------------------------------------

pub(crate) fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

pub(crate) fn span_of(node: Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract every imported name of an `import_statement` or `import_from_statement` node.
///
/// `from __future__ import ...` is a `future_import_statement` in the grammar and binds
/// nothing the graph cares about, so it never reaches this function.
pub fn extract_import(node: Node, source: &[u8]) -> Vec<ImportInfo> {
    let statement_span = span_of(node);
    let mut cursor = node.walk();
    let items: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();

    match node.kind() {
        "import_statement" => {
            let count = items.len();
            items
                .into_iter()
                .filter_map(|item| {
                    let (name_node, alias_node) = split_aliased(item)?;
                    let module = node_text(name_node, source).to_owned();
                    Some(ImportInfo {
                        style: ImportStyle::Module,
                        module,
                        member: None,
                        alias: alias_node.map(|a| node_text(a, source).to_owned()),
                        statement_span,
                        module_span: span_of(name_node),
                        name_span: span_of(name_node),
                        item_span: span_of(item),
                        alias_span: alias_node.map(span_of),
                        names_in_statement: count,
                    })
                })
                .collect()
        }
        "import_from_statement" => {
            let Some(module_node) = node.child_by_field_name("module_name") else {
                return Vec::new();
            };
            let module = node_text(module_node, source).to_owned();
            let module_span = span_of(module_node);

            let mut wildcard_cursor = node.walk();
            let wildcard = node
                .named_children(&mut wildcard_cursor)
                .find(|c| c.kind() == "wildcard_import");
            if let Some(star) = wildcard {
                return vec![ImportInfo {
                    style: ImportStyle::Wildcard,
                    module,
                    member: None,
                    alias: None,
                    statement_span,
                    module_span,
                    name_span: span_of(star),
                    item_span: span_of(star),
                    alias_span: None,
                    names_in_statement: 1,
                }];
            }

            let count = items.len();
            items
                .into_iter()
                .filter_map(|item| {
                    let (name_node, alias_node) = split_aliased(item)?;
                    Some(ImportInfo {
                        style: ImportStyle::From,
                        module: module.clone(),
                        member: Some(node_text(name_node, source).to_owned()),
                        alias: alias_node.map(|a| node_text(a, source).to_owned()),
                        statement_span,
                        module_span,
                        name_span: span_of(name_node),
                        item_span: span_of(item),
                        alias_span: alias_node.map(span_of),
                        names_in_statement: count,
                    })
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// `(name, alias)` of an import list item.
fn split_aliased(item: Node) -> Option<(Node, Option<Node>)> {
    match item.kind() {
        "aliased_import" => Some((
            item.child_by_field_name("name")?,
            item.child_by_field_name("alias"),
        )),
        "dotted_name" => Some((item, None)),
        _ => None,
    }
}

/// Extract the string entries of `__all__ = [...]`, `__all__ += [...]` or a tuple form.
///
/// `assignment` is an `assignment` or `augmented_assignment` node. Entries that are not plain
/// string literals (concatenations, f-strings, names) are skipped.
pub fn extract_all_entries(assignment: Node, source: &[u8]) -> Vec<ExportInfo> {
    let Some(left) = assignment.child_by_field_name("left") else {
        return Vec::new();
    };
    if left.kind() != "identifier" || node_text(left, source) != "__all__" {
        return Vec::new();
    }
    let Some(right) = assignment.child_by_field_name("right") else {
        return Vec::new();
    };
    if !matches!(right.kind(), "list" | "tuple") {
        return Vec::new();
    }

    let mut entries = Vec::new();
    let mut cursor = right.walk();
    for element in right.named_children(&mut cursor) {
        if element.kind() != "string" {
            continue;
        }
        let mut parts = element.walk();
        let contents: Vec<Node> = element
            .named_children(&mut parts)
            .filter(|c| c.kind() == "string_content")
            .collect();
        let has_interpolation = {
            let mut c = element.walk();
            element
                .named_children(&mut c)
                .any(|n| n.kind() == "interpolation")
        };
        if has_interpolation || contents.len() != 1 {
            continue;
        }
        let content = contents[0];
        entries.push(ExportInfo {
            entry: node_text(content, source).to_owned(),
            content_span: span_of(content),
            literal_span: span_of(element),
        });
    }
    entries
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::languages::python_language;

    fn parse(source: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&python_language()).unwrap();
        parser.parse(source.as_bytes(), None).unwrap()
    }

    fn imports_of(source: &str) -> Vec<ImportInfo> {
        let tree = parse(source);
        let root = tree.root_node();
        let mut cursor = root.walk();
        root.named_children(&mut cursor)
            .flat_map(|n| extract_import(n, source.as_bytes()))
            .collect()
    }

    #[test]
    fn test_module_imports() {
        let src = "import os, a.b as c\n";
        let imports = imports_of(src);
        assert_eq!(imports.len(), 2);

        assert_eq!(imports[0].style, ImportStyle::Module);
        assert_eq!(imports[0].module, "os");
        assert_eq!(imports[0].binding_name(), "os");
        assert_eq!(imports[0].names_in_statement, 2);

        assert_eq!(imports[1].module, "a.b");
        assert_eq!(imports[1].alias.as_deref(), Some("c"));
        assert_eq!(imports[1].binding_name(), "c");
        assert_eq!(&src[imports[1].item_span.as_range()], "a.b as c");
    }

    #[test]
    fn test_dotted_module_import_binds_full_path() {
        let imports = imports_of("import pkg.sub\n");
        assert_eq!(imports[0].binding_name(), "pkg.sub");
        assert!(!imports[0].is_aliased());
    }

    #[test]
    fn test_from_imports_with_spans() {
        let src = "from a import helper, other as o\n";
        let imports = imports_of(src);
        assert_eq!(imports.len(), 2);

        let helper = &imports[0];
        assert_eq!(helper.style, ImportStyle::From);
        assert_eq!(helper.member.as_deref(), Some("helper"));
        assert_eq!(&src[helper.module_span.as_range()], "a");
        assert_eq!(&src[helper.name_span.as_range()], "helper");
        assert_eq!(&src[helper.statement_span.as_range()], src.trim_end());

        let other = &imports[1];
        assert_eq!(other.binding_name(), "o");
        assert_eq!(&src[other.alias_span.unwrap().as_range()], "o");
        assert_eq!(other.names_in_statement, 2);
    }

    #[test]
    fn test_relative_and_parenthesized_imports() {
        let src = "from ..pkg import (x,\n    y)\n";
        let imports = imports_of(src);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].module, "..pkg");
        assert!(imports[0].is_relative());
        assert_eq!(imports[1].member.as_deref(), Some("y"));
    }

    #[test]
    fn test_wildcard_import() {
        let imports = imports_of("from m import *\n");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].style, ImportStyle::Wildcard);
        assert_eq!(imports[0].binding_name(), "*");
    }

    #[test]
    fn test_future_import_is_not_extracted() {
        assert!(imports_of("from __future__ import annotations\n").is_empty());
    }

    #[test]
    fn test_all_entries() {
        let src = "__all__ = [\"helper\", 'Thing', name]\n";
        let tree = parse(src);
        let stmt = tree.root_node().named_child(0).unwrap();
        let assignment = stmt.named_child(0).unwrap();
        let entries = extract_all_entries(assignment, src.as_bytes());

        let names: Vec<_> = entries.iter().map(|e| e.entry.as_str()).collect();
        assert_eq!(names, vec!["helper", "Thing"], "non-literal entries are skipped");
        assert_eq!(&src[entries[0].content_span.as_range()], "helper");
        assert_eq!(&src[entries[0].literal_span.as_range()], "\"helper\"");
    }
}
