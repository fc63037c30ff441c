use std::collections::{HashMap, HashSet};

use tree_sitter::Node;

use crate::graph::node::{Span, SymbolKind};

use super::imports::{ImportInfo, extract_import, node_text, span_of};
use super::symbols::{ExtractedSymbol, collect_target_names};

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// One name segment of a reference chain.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub name: String,
    pub span: Span,
}

/// A load of a name or dotted attribute chain (`helper`, `mod.helper`, `Cls.run`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Reference {
    pub chain: Vec<Segment>,
    /// Innermost enclosing symbol (index into the file's symbol list). `None` at module level.
    pub scope: Option<usize>,
    /// The class whose body directly contains the reference, if any.
    pub class_body: Option<usize>,
}

impl Reference {
    pub fn head(&self) -> &Segment {
        &self.chain[0]
    }

    /// Span from the start of the chain to the end of segment `k`.
    pub fn prefix_span(&self, k: usize) -> Span {
        Span::new(self.chain[0].span.start, self.chain[k].span.end)
    }

    pub fn dotted(&self, upto: usize) -> String {
        self.chain[..=upto]
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// A base class expression: position in the base list and its name chain.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BaseRef {
    pub position: usize,
    pub chain: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClassBases {
    pub class: usize,
    pub bases: Vec<BaseRef>,
}

/// An import statement inside a function body, visible only to that function.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LocalImport {
    pub scope: usize,
    pub import: ImportInfo,
}

#[derive(Debug, Default)]
pub struct References {
    pub references: Vec<Reference>,
    pub bases: Vec<ClassBases>,
    pub local_imports: Vec<LocalImport>,
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Frame {
    Module,
    Class(usize),
    /// Function, lambda or comprehension scope with its local bindings.
    Local(HashSet<String>),
}

struct Walker<'a> {
    source: &'a [u8],
    /// Definition span -> symbol indices (several targets of one assignment share a span).
    defs: HashMap<(usize, usize), Vec<usize>>,
    /// Module-level names bound by `for`/`with`/`except` rather than by a symbol.
    module_locals: HashSet<String>,
    frames: Vec<Frame>,
    scopes: Vec<usize>,
    out: References,
}

/// Extract every name load of a module with its enclosing symbol.
///
/// Names bound locally in a function, lambda or comprehension (parameters, assignment
/// targets, loop variables, `self`) are skipped: only module-visible names can reach
/// another symbol.
pub fn extract_references(root: Node, source: &[u8], symbols: &[ExtractedSymbol]) -> References {
    let mut defs: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    let mut module_symbol_names: HashSet<&str> = HashSet::new();
    for (idx, sym) in symbols.iter().enumerate() {
        if matches!(sym.info.kind, SymbolKind::Function | SymbolKind::Class | SymbolKind::Variable) {
            defs.entry((sym.info.span.start, sym.info.span.end))
                .or_default()
                .push(idx);
        }
        if sym.parent.is_none() {
            module_symbol_names.insert(sym.info.name.as_str());
        }
    }

    let mut module_locals = HashSet::new();
    collect_bindings(root, source, &mut module_locals, &mut HashSet::new(), false);
    module_locals.retain(|n: &String| !module_symbol_names.contains(n.as_str()));

    let mut walker = Walker {
        source,
        defs,
        module_locals,
        frames: vec![Frame::Module],
        scopes: Vec::new(),
        out: References::default(),
    };
    walker.visit(root);
    walker.out
}

impl<'a> Walker<'a> {
    fn text(&self, node: Node) -> String {
        node_text(node, self.source).to_owned()
    }

    /// Push the symbols defined by `node` (if any) as the current scope.
    fn enter_definition(&mut self, node: Node) -> bool {
        let key = (node.start_byte(), node.end_byte());
        match self.defs.get(&key).and_then(|v| v.first()) {
            Some(&idx) => {
                self.scopes.push(idx);
                true
            }
            None => false,
        }
    }

    fn leave_definition(&mut self, entered: bool) {
        if entered {
            self.scopes.pop();
        }
    }

    fn is_local(&self, name: &str) -> bool {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Local(locals) if locals.contains(name) => return true,
                Frame::Module => return self.module_locals.contains(name),
                _ => {}
            }
        }
        false
    }

    fn emit(&mut self, chain: Vec<Segment>) {
        if chain.is_empty() || self.is_local(&chain[0].name) {
            return;
        }
        let class_body = match self.frames.last() {
            Some(Frame::Class(idx)) => Some(*idx),
            _ => None,
        };
        self.out.references.push(Reference {
            chain,
            scope: self.scopes.last().copied(),
            class_body,
        });
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit_field(&mut self, node: Node, field: &str) {
        if let Some(child) = node.child_by_field_name(field) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "comment" | "global_statement" | "nonlocal_statement" | "future_import_statement"
            | "case_pattern" | "dotted_name" | "keyword_identifier" => {}

            "identifier" => {
                let chain = vec![Segment {
                    name: self.text(node),
                    span: span_of(node),
                }];
                self.emit(chain);
            }

            "attribute" => match chain_of(node, self.source) {
                Some(chain) => self.emit(chain),
                None => self.visit_field(node, "object"),
            },

            "string" | "concatenated_string" => {
                let mut cursor = node.walk();
                let parts: Vec<Node> = node.named_children(&mut cursor).collect();
                for part in parts {
                    if matches!(part.kind(), "interpolation" | "string") {
                        self.visit(part);
                    }
                }
            }

            "expression_statement" => {
                let entered = self.enter_definition(node);
                self.visit_children(node);
                self.leave_definition(entered);
            }

            "decorated_definition" => {
                let entered = self.enter_definition(node);
                self.visit_children(node);
                self.leave_definition(entered);
            }

            "function_definition" => self.visit_function(node),
            "class_definition" => self.visit_class(node),

            "lambda" => {
                let mut locals = HashSet::new();
                if let Some(params) = node.child_by_field_name("parameters") {
                    self.visit_parameters(params, &mut locals);
                }
                self.frames.push(Frame::Local(locals));
                self.visit_field(node, "body");
                self.frames.pop();
            }

            "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
            | "generator_expression" => {
                let mut locals = HashSet::new();
                let mut cursor = node.walk();
                let children: Vec<Node> = node.named_children(&mut cursor).collect();
                for child in &children {
                    if child.kind() == "for_in_clause"
                        && let Some(left) = child.child_by_field_name("left")
                    {
                        let mut targets = Vec::new();
                        collect_target_names(left, &mut targets);
                        locals.extend(targets.into_iter().map(|t| self.text(t)));
                    }
                }
                self.frames.push(Frame::Local(locals));
                for child in children {
                    if child.kind() == "for_in_clause" {
                        self.visit_field(child, "right");
                        let mut c = child.walk();
                        let conditions: Vec<Node> = child
                            .named_children(&mut c)
                            .filter(|n| n.kind() == "if_clause")
                            .collect();
                        for cond in conditions {
                            self.visit(cond);
                        }
                    } else {
                        self.visit(child);
                    }
                }
                self.frames.pop();
            }

            "import_statement" | "import_from_statement" => {
                let in_function = matches!(self.frames.last(), Some(Frame::Local(_)));
                if in_function && let Some(&scope) = self.scopes.last() {
                    for import in extract_import(node, self.source) {
                        self.out.local_imports.push(LocalImport { scope, import });
                    }
                }
            }

            "assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.visit_target(left);
                }
                self.visit_field(node, "type");
                self.visit_field(node, "right");
            }

            "augmented_assignment" => {
                self.visit_field(node, "left");
                self.visit_field(node, "right");
            }

            "for_statement" | "for_in_clause" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.visit_target(left);
                }
                self.visit_field(node, "right");
                self.visit_field(node, "body");
                self.visit_field(node, "alternative");
            }

            "named_expression" => self.visit_field(node, "value"),

            "keyword_argument" => self.visit_field(node, "value"),

            "as_pattern" => {
                if let Some(value) = node.named_child(0) {
                    self.visit(value);
                }
            }

            "except_clause" | "except_group_clause" => {
                let mut after_as = false;
                let mut cursor = node.walk();
                let children: Vec<Node> = node.children(&mut cursor).collect();
                for child in children {
                    if !child.is_named() {
                        after_as = child.kind() == "as";
                        continue;
                    }
                    if after_as {
                        after_as = false;
                        continue;
                    }
                    self.visit(child);
                }
            }

            _ => self.visit_children(node),
        }
    }

    /// Visit an assignment target: bound names are skipped, reads inside are visited.
    fn visit_target(&mut self, target: Node) {
        match target.kind() {
            "identifier" => {}
            "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern"
            | "parenthesized_expression" | "expression_list" | "tuple" | "list" => {
                let mut cursor = target.walk();
                let children: Vec<Node> = target.named_children(&mut cursor).collect();
                for child in children {
                    self.visit_target(child);
                }
            }
            "attribute" => self.visit_field(target, "object"),
            _ => self.visit(target),
        }
    }

    /// Defaults and annotations are evaluated in the enclosing scope; names go to `locals`.
    fn visit_parameters(&mut self, params: Node, locals: &mut HashSet<String>) {
        let mut cursor = params.walk();
        let children: Vec<Node> = params.named_children(&mut cursor).collect();
        for param in children {
            match param.kind() {
                "identifier" => {
                    locals.insert(self.text(param));
                }
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(name) = param.child_by_field_name("name") {
                        let mut targets = Vec::new();
                        collect_target_names(name, &mut targets);
                        locals.extend(targets.into_iter().map(|t| self.text(t)));
                    }
                    self.visit_field(param, "type");
                    self.visit_field(param, "value");
                }
                "typed_parameter" => {
                    let mut c = param.walk();
                    let inner: Vec<Node> = param.named_children(&mut c).collect();
                    for n in inner {
                        match n.kind() {
                            "identifier" => {
                                locals.insert(self.text(n));
                            }
                            "list_splat_pattern" | "dictionary_splat_pattern" => {
                                if let Some(id) = n.named_child(0) {
                                    locals.insert(self.text(id));
                                }
                            }
                            _ => {}
                        }
                    }
                    self.visit_field(param, "type");
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    if let Some(id) = param.named_child(0) {
                        locals.insert(self.text(id));
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_function(&mut self, node: Node) {
        let entered = self.enter_definition(node);

        let mut locals = HashSet::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            self.visit_parameters(params, &mut locals);
        }
        self.visit_field(node, "return_type");

        if let Some(body) = node.child_by_field_name("body") {
            let mut declared_global = HashSet::new();
            collect_bindings(body, self.source, &mut locals, &mut declared_global, true);
            for name in &declared_global {
                locals.remove(name);
            }
            self.frames.push(Frame::Local(locals));
            self.visit(body);
            self.frames.pop();
        }

        self.leave_definition(entered);
    }

    fn visit_class(&mut self, node: Node) {
        let entered = self.enter_definition(node);
        let class_idx = if entered { self.scopes.last().copied() } else { None };

        if let Some(args) = node.child_by_field_name("superclasses") {
            let mut bases = Vec::new();
            let mut position = 0;
            let mut cursor = args.walk();
            let children: Vec<Node> = args.named_children(&mut cursor).collect();
            for arg in children {
                match arg.kind() {
                    "keyword_argument" | "list_splat" | "dictionary_splat" | "comment" => {}
                    _ => {
                        let expr = if arg.kind() == "subscript" {
                            arg.child_by_field_name("value").unwrap_or(arg)
                        } else {
                            arg
                        };
                        if let Some(chain) = chain_of(expr, self.source) {
                            bases.push(BaseRef { position, chain });
                        }
                        position += 1;
                    }
                }
                self.visit(arg);
            }
            if let Some(class) = class_idx
                && !bases.is_empty()
            {
                self.out.bases.push(ClassBases { class, bases });
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            match class_idx {
                Some(idx) => {
                    self.frames.push(Frame::Class(idx));
                    self.visit(body);
                    self.frames.pop();
                }
                // A class inside a function body: its members are not symbols.
                None => {
                    self.frames.push(Frame::Local(HashSet::new()));
                    self.visit(body);
                    self.frames.pop();
                }
            }
        }

        self.leave_definition(entered);
    }
}

/// Name chain of an `identifier` or `attribute` node, `None` for anything else
/// (calls, subscripts) at the base.
pub fn chain_of(node: Node, source: &[u8]) -> Option<Vec<Segment>> {
    match node.kind() {
        "identifier" => Some(vec![Segment {
            name: node_text(node, source).to_owned(),
            span: span_of(node),
        }]),
        "attribute" => {
            let object = node.child_by_field_name("object")?;
            let attr = node.child_by_field_name("attribute")?;
            let mut chain = chain_of(object, source)?;
            chain.push(Segment {
                name: node_text(attr, source).to_owned(),
                span: span_of(attr),
            });
            Some(chain)
        }
        _ => None,
    }
}

/// Names bound in a block without descending into nested scopes.
///
/// With `include_assignments`, plain assignment targets count too (function bodies);
/// nested `def`/`class` names always count. `global`/`nonlocal` names are reported in
/// `declared_global`.
fn collect_bindings(
    node: Node,
    source: &[u8],
    out: &mut HashSet<String>,
    declared_global: &mut HashSet<String>,
    include_assignments: bool,
) {
    let push_targets = |target: Node, out: &mut HashSet<String>| {
        let mut targets = Vec::new();
        collect_target_names(target, &mut targets);
        out.extend(targets.into_iter().map(|t| node_text(t, source).to_owned()));
    };

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        match child.kind() {
            "function_definition" | "class_definition" => {
                if include_assignments && let Some(name) = child.child_by_field_name("name") {
                    out.insert(node_text(name, source).to_owned());
                }
                continue;
            }
            "lambda" | "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
            | "generator_expression" => continue,
            "assignment" | "augmented_assignment" if include_assignments => {
                if let Some(left) = child.child_by_field_name("left") {
                    push_targets(left, out);
                }
            }
            "for_statement" => {
                if let Some(left) = child.child_by_field_name("left") {
                    push_targets(left, out);
                }
            }
            "named_expression" => {
                if let Some(name) = child.child_by_field_name("name") {
                    out.insert(node_text(name, source).to_owned());
                }
            }
            "as_pattern_target" => push_targets_of_children(child, source, out),
            "global_statement" | "nonlocal_statement" => {
                let mut c = child.walk();
                for id in child.named_children(&mut c) {
                    declared_global.insert(node_text(id, source).to_owned());
                }
                continue;
            }
            "except_clause" | "except_group_clause" => {
                let mut after_as = false;
                let mut c = child.walk();
                for part in child.children(&mut c) {
                    if !part.is_named() {
                        after_as = part.kind() == "as";
                    } else if after_as && part.kind() == "identifier" {
                        out.insert(node_text(part, source).to_owned());
                        after_as = false;
                    }
                }
            }
            _ => {}
        }
        collect_bindings(child, source, out, declared_global, include_assignments);
    }
}

fn push_targets_of_children(node: Node, source: &[u8], out: &mut HashSet<String>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let mut targets = Vec::new();
        collect_target_names(child, &mut targets);
        out.extend(targets.into_iter().map(|t| node_text(t, source).to_owned()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
