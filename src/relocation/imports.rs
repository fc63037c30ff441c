//! Text helpers for generated import statements and line-level removals.

use std::ops::Range;
use std::path::Path;

use crate::graph::WorkspaceGraph;
use crate::graph::node::{Span, SymbolKind};
use crate::parser::imports::{ImportInfo, ImportStyle};

/// Offset just past the line containing `offset` (past its newline, or the end of text).
pub(super) fn line_end(text: &str, offset: usize) -> usize {
    match text[offset..].find('\n') {
        Some(i) => offset + i + 1,
        None => text.len(),
    }
}

pub(super) fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// The whole lines covered by `span`, trailing newline included.
pub(super) fn statement_lines(text: &str, span: Span) -> Range<usize> {
    line_start(text, span.start)..line_end(text, span.end)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Range removing a top-level definition: its lines plus the blank lines after it. A
/// definition at the end of the file takes the blank lines before it instead.
pub(super) fn definition_removal(text: &str, span: Span) -> Range<usize> {
    let Range { mut start, mut end } = statement_lines(text, span);
    while end < text.len() {
        let next = line_end(text, end);
        if !is_blank(&text[end..next]) {
            break;
        }
        end = next;
    }
    if end == text.len() {
        while start > 0 {
            let prev = line_start(text, start - 1);
            if !is_blank(&text[prev..start]) {
                break;
            }
            start = prev;
        }
    }
    start..end
}

/// Range removing one imported name. Single-name statements are removed whole; otherwise
/// the list item and one adjacent comma go.
pub(super) fn import_item_removal(text: &str, import: &ImportInfo) -> Range<usize> {
    let statement = import.statement_span;
    let item = import.item_span;
    if import.names_in_statement <= 1 {
        return statement_lines(text, statement);
    }

    let after = &text[item.end..statement.end];
    let trimmed = after.trim_start_matches([' ', '\t']);
    if let Some(rest) = trimmed.strip_prefix(',') {
        let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        let end = statement.end - rest.len() + spaces;
        return item.start..end;
    }
    match text[statement.start..item.start].rfind(',') {
        Some(comma) => statement.start + comma..item.end,
        None => item.start..item.end,
    }
}

/// `from module import name [as alias]`, without a newline.
pub(super) fn from_import(module: &str, name: &str, alias: Option<&str>) -> String {
    match alias {
        Some(alias) if alias != name => format!("from {module} import {name} as {alias}"),
        _ => format!("from {module} import {name}"),
    }
}

/// Re-emit `import` (written in `importer`) with an absolute module path.
///
/// Returns the name it binds and the statement text, or `None` if the module cannot be
/// made absolute.
pub(super) fn absolute_import(graph: &WorkspaceGraph, importer: &Path, import: &ImportInfo) -> Option<(String, String)> {
    let module = crate::resolver::imports::import_module(graph, importer, import)?;
    let binding = import.binding_name().to_owned();
    let line = match import.style {
        ImportStyle::Module => match &import.alias {
            Some(alias) => format!("import {module} as {alias}"),
            None => format!("import {module}"),
        },
        ImportStyle::From => from_import(&module, import.member.as_deref()?, import.alias.as_deref()),
        ImportStyle::Wildcard => format!("from {module} import *"),
    };
    Some((binding, line))
}

/// Where new import statements go: after the last top-level import, else after a module
/// docstring, else at the top.
pub(super) fn insertion_point(graph: &WorkspaceGraph, path: &Path, text: &str) -> usize {
    let Ok(entry) = graph.entry(path) else {
        return 0;
    };
    let last_import = entry
        .symbols
        .iter()
        .filter_map(|&n| graph.symbol_info(n))
        .filter(|s| s.kind == SymbolKind::Import && s.parent.is_none() && !s.conditional)
        .map(|s| s.span.end)
        .max();
    if let Some(end) = last_import {
        return line_end(text, end);
    }

    let mut statements = graph.statements(path).unwrap_or_default();
    statements.retain(|s| s.parent.is_none());
    statements.sort_by_key(|s| s.span.start);
    match statements.first() {
        Some(first)
            if first.kind == "expression_statement"
                && text[first.span.as_range()]
                    .trim_start_matches(['r', 'R', 'u', 'U', 'b', 'B'])
                    .starts_with(['"', '\'']) =>
        {
            line_end(text, first.span.end)
        }
        _ => 0,
    }
}

/// Lines to insert at an import insertion point.
pub(super) fn import_block(lines: &[String], offset: usize, text: &str) -> String {
    let mut block: String = lines.iter().map(|l| format!("{l}\n")).collect();
    if offset == 0 && !text.trim().is_empty() && !lines.is_empty() {
        block.push('\n');
    } else if offset > 0 && !text[..offset].ends_with('\n') {
        block.insert(0, '\n');
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(text: &str, name: &str, names: usize) -> ImportInfo {
        let item = text.find(name).unwrap();
        ImportInfo {
            style: ImportStyle::From,
            module: "a".into(),
            member: Some(name.into()),
            alias: None,
            statement_span: Span::new(0, text.find('\n').unwrap()),
            module_span: Span::new(5, 6),
            name_span: Span::new(item, item + name.len()),
            item_span: Span::new(item, item + name.len()),
            alias_span: None,
            names_in_statement: names,
        }
    }

    #[test]
    fn test_remove_import_items() {
        let text = "from a import helper, other\nx = 1\n";
        let r = import_item_removal(text, &import(text, "helper", 2));
        assert_eq!(format!("{}{}", &text[..r.start], &text[r.end..]), "from a import other\nx = 1\n");

        let r = import_item_removal(text, &import(text, "other", 2));
        assert_eq!(format!("{}{}", &text[..r.start], &text[r.end..]), "from a import helper\nx = 1\n");

        let single = "from a import helper\nx = 1\n";
        let r = import_item_removal(single, &import(single, "helper", 1));
        assert_eq!(&single[r.end..], "x = 1\n");
        assert_eq!(r.start, 0);
    }

    #[test]
    fn test_definition_removal_takes_blank_lines() {
        let text = "import x\n\n\ndef helper():\n    pass\n\n\ndef other():\n    pass\n";
        let start = text.find("def helper").unwrap();
        let end = text.find("pass").unwrap() + 4;
        let r = definition_removal(text, Span::new(start, end));
        assert_eq!(format!("{}{}", &text[..r.start], &text[r.end..]), "import x\n\n\ndef other():\n    pass\n");

        let last = text.rfind("def other").unwrap();
        let r = definition_removal(text, Span::new(last, text.len() - 1));
        assert_eq!(format!("{}{}", &text[..r.start], &text[r.end..]), "import x\n\n\ndef helper():\n    pass\n");
    }

    #[test]
    fn test_from_import_text() {
        assert_eq!(from_import("c", "helper", None), "from c import helper");
        assert_eq!(from_import("c", "helper", Some("h")), "from c import helper as h");
        assert_eq!(from_import("c", "helper", Some("helper")), "from c import helper");
    }
}
