use std::path::Path;

use tree_sitter::Node;

use crate::graph::node::{Span, StatementInfo, SymbolInfo, SymbolKind};

use super::imports::{ExportInfo, ImportInfo, ImportStyle, extract_all_entries, extract_import, node_text, span_of};

/// A symbol extracted from one file, with the index of its enclosing symbol.
#[derive(Debug, Clone)]
pub struct ExtractedSymbol {
    pub info: SymbolInfo,
    /// Index into the same symbol list.
    pub parent: Option<usize>,
}

/// Symbols and statements of one file, in source order.
#[derive(Debug, Default)]
pub struct Structure {
    pub symbols: Vec<ExtractedSymbol>,
    pub statements: Vec<StatementInfo>,
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

struct Collector<'a> {
    source: &'a [u8],
    file: &'a Path,
    out: Structure,
}

/// Extract definitions, imports, `__all__` entries and statements from a parsed module.
///
/// Symbols are:
/// - module-level `def`/`class`/assignment targets, including those nested in module-level
///   `if`/`try`/`with` blocks (flagged `conditional`);
/// - class members: methods, class attributes and nested classes;
/// - one Import symbol per imported name of a module-level import statement;
/// - one Export symbol per string entry of `__all__`.
///
/// Function bodies contribute statements but no symbols.
///
/// Statements are the direct children of the module, of every class body and of every
/// function body, each with its enclosing definition as parent (`None` at module level).
/// A conditional block (`if`/`try`/`with`) is one statement; the statements inside it
/// are not recorded, except the bodies of definitions made there.
pub fn extract_structure(root: Node, source: &[u8], file: &Path) -> Structure {
    let mut collector = Collector {
        source,
        file,
        out: Structure::default(),
    };
    collector.visit_block(root, None, false);
    collector.out
}

impl<'a> Collector<'a> {
    fn qualified(&self, parent: Option<usize>, name: &str) -> String {
        match parent {
            Some(p) => format!("{}.{}", self.out.symbols[p].info.qualified_name, name),
            None => name.to_owned(),
        }
    }

    fn push_symbol(
        &mut self,
        name: String,
        kind: SymbolKind,
        span: Span,
        name_span: Span,
        parent: Option<usize>,
        conditional: bool,
    ) -> usize {
        let qualified_name = self.qualified(parent, &name);
        let parent_name = parent.map(|p| self.out.symbols[p].info.qualified_name.clone());
        self.out.symbols.push(ExtractedSymbol {
            info: SymbolInfo {
                name,
                qualified_name,
                kind,
                file: self.file.to_path_buf(),
                span,
                name_span,
                parent: parent_name,
                conditional,
                import: None,
                export: None,
            },
            parent,
        });
        self.out.symbols.len() - 1
    }

    fn push_statement(&mut self, node: Node, parent: Option<usize>) {
        let parent_name = parent.map(|p| self.out.symbols[p].info.qualified_name.clone());
        self.out.statements.push(StatementInfo {
            kind: node.kind().to_owned(),
            file: self.file.to_path_buf(),
            span: span_of(node),
            parent: parent_name,
        });
    }

    /// Visit the statements of a module, a class body, or a conditional block inside either.
    fn visit_block(&mut self, block: Node, parent: Option<usize>, conditional: bool) {
        let mut cursor = block.walk();
        let statements: Vec<Node> = block.named_children(&mut cursor).collect();

        for stmt in statements {
            if stmt.kind() == "comment" {
                continue;
            }
            if !conditional {
                self.push_statement(stmt, parent);
            }
            self.visit_statement(stmt, parent, conditional);
        }
    }

    fn visit_statement(&mut self, stmt: Node, parent: Option<usize>, conditional: bool) {
        match stmt.kind() {
            "function_definition" | "class_definition" => {
                self.add_definition(stmt, span_of(stmt), parent, conditional);
            }
            "decorated_definition" => {
                if let Some(def) = stmt.child_by_field_name("definition") {
                    self.add_definition(def, span_of(stmt), parent, conditional);
                }
            }
            "expression_statement" => {
                let mut cursor = stmt.walk();
                let children: Vec<Node> = stmt.named_children(&mut cursor).collect();
                for child in children {
                    match child.kind() {
                        "assignment" => {
                            self.add_assignment(child, span_of(stmt), parent, conditional);
                        }
                        "augmented_assignment" if parent.is_none() => {
                            self.add_exports(extract_all_entries(child, self.source));
                        }
                        _ => {}
                    }
                }
            }
            "import_statement" | "import_from_statement" if parent.is_none() => {
                for import in extract_import(stmt, self.source) {
                    self.add_import(import, conditional);
                }
            }
            "if_statement" => {
                if let Some(body) = stmt.child_by_field_name("consequence") {
                    self.visit_block(body, parent, true);
                }
                let mut cursor = stmt.walk();
                let alternatives: Vec<Node> = stmt
                    .children_by_field_name("alternative", &mut cursor)
                    .collect();
                for alt in alternatives {
                    let body = alt
                        .child_by_field_name("consequence")
                        .or_else(|| alt.child_by_field_name("body"));
                    if let Some(body) = body {
                        self.visit_block(body, parent, true);
                    }
                }
            }
            "try_statement" => {
                let mut cursor = stmt.walk();
                let children: Vec<Node> = stmt.named_children(&mut cursor).collect();
                for child in children {
                    match child.kind() {
                        "block" => self.visit_block(child, parent, true),
                        "except_clause" | "except_group_clause" | "else_clause"
                        | "finally_clause" => {
                            if let Some(block) = last_block(child) {
                                self.visit_block(block, parent, true);
                            }
                        }
                        _ => {}
                    }
                }
            }
            "with_statement" => {
                if let Some(body) = stmt.child_by_field_name("body") {
                    self.visit_block(body, parent, true);
                }
            }
            _ => {}
        }
    }

    fn add_definition(&mut self, def: Node, span: Span, parent: Option<usize>, conditional: bool) {
        let Some(name_node) = def.child_by_field_name("name") else {
            return;
        };
        let kind = if def.kind() == "class_definition" {
            SymbolKind::Class
        } else {
            SymbolKind::Function
        };
        let name = node_text(name_node, self.source).to_owned();
        let idx = self.push_symbol(name, kind, span, span_of(name_node), parent, conditional);

        let Some(body) = def.child_by_field_name("body") else {
            return;
        };
        match kind {
            SymbolKind::Class => self.visit_block(body, Some(idx), false),
            _ => {
                let mut cursor = body.walk();
                let statements: Vec<Node> = body
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .collect();
                for stmt in statements {
                    self.push_statement(stmt, Some(idx));
                }
            }
        }
    }

    fn add_assignment(&mut self, assignment: Node, span: Span, parent: Option<usize>, conditional: bool) {
        if parent.is_none() {
            let exports = extract_all_entries(assignment, self.source);
            if !exports.is_empty() {
                // `__all__` itself stays a Variable so references to it resolve.
                self.add_exports(exports);
            }
        }

        if let Some(left) = assignment.child_by_field_name("left") {
            let mut targets = Vec::new();
            collect_target_names(left, &mut targets);
            for target in targets {
                let name = node_text(target, self.source).to_owned();
                self.push_symbol(name, SymbolKind::Variable, span, span_of(target), parent, conditional);
            }
        }

        // `a = b = value` nests the second assignment on the right.
        if let Some(right) = assignment.child_by_field_name("right")
            && right.kind() == "assignment"
        {
            self.add_assignment(right, span, parent, conditional);
        }
    }

    fn add_import(&mut self, import: ImportInfo, conditional: bool) {
        let name = import.binding_name().to_owned();
        let name_span = import.alias_span.unwrap_or(import.name_span);
        let span = import.statement_span;
        let idx = if import.style == ImportStyle::Wildcard {
            // Unique per module so wildcard imports keep distinct identities.
            let qualified_name = format!("*{}", import.module);
            let i = self.push_symbol(name, SymbolKind::Import, span, name_span, None, conditional);
            self.out.symbols[i].info.qualified_name = qualified_name;
            i
        } else {
            self.push_symbol(name, SymbolKind::Import, span, name_span, None, conditional)
        };
        self.out.symbols[idx].info.import = Some(import);
    }

    fn add_exports(&mut self, exports: Vec<ExportInfo>) {
        for export in exports {
            let idx = self.push_symbol(
                export.entry.clone(),
                SymbolKind::Export,
                export.literal_span,
                export.content_span,
                None,
                false,
            );
            self.out.symbols[idx].info.export = Some(export);
        }
    }
}

/// The trailing `block` child of a clause (`except E as e: <block>`).
fn last_block(clause: Node) -> Option<Node> {
    let mut cursor = clause.walk();
    clause
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "block")
        .last()
}

/// Identifiers bound by an assignment target. Attribute and subscript targets bind nothing.
pub(crate) fn collect_target_names<'t>(target: Node<'t>, out: &mut Vec<Node<'t>>) {
    match target.kind() {
        "identifier" => out.push(target),
        "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern"
        | "parenthesized_expression" | "expression_list" | "tuple" | "list" => {
            let mut cursor = target.walk();
            let children: Vec<Node> = target.named_children(&mut cursor).collect();
            for child in children {
                collect_target_names(child, out);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
