use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use petgraph::stable_graph::NodeIndex;

use crate::error::ParseError;
use crate::language::LanguageKind;
use crate::parser::imports::{ExportInfo, ImportInfo};
use crate::storage::FileMeta;

/// Stable identifier of a node in the workspace graph.
///
/// Ids survive re-parses of unchanged files, re-parses of changed files that keep the
/// symbol (same qualified name and kind), and moves of a symbol between files within a
/// single commit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct SymbolId(pub(crate) NodeIndex);

impl SymbolId {
    pub(crate) fn index(self) -> NodeIndex {
        self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym#{}", self.0.index())
    }
}

/// Half-open byte range `[start, end)` into a file's text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} after end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `other` lies entirely inside this span.
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for Span {
    fn from(r: Range<usize>) -> Self {
        Span::new(r.start, r.end)
    }
}

/// The kind of symbol extracted from source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SymbolKind {
    /// A `def` at module level, or a method inside a class body.
    Function,
    /// A `class` definition.
    Class,
    /// A module-level or class-level assignment target.
    Variable,
    /// One name bound by an `import` / `from ... import` statement.
    Import,
    /// One entry of a module's `__all__` list.
    Export,
    /// A definition outside the workspace. Internals are not modelled.
    ExternalModule,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Variable => "variable",
            SymbolKind::Import => "import",
            SymbolKind::Export => "export",
            SymbolKind::ExternalModule => "external",
        }
    }
}

/// Metadata about a symbol defined in a workspace file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SymbolInfo {
    /// The bound name. For dotted module imports without alias this is the full dotted path.
    pub name: String,
    /// Dotted path inside the file, e.g. `Service.run` for a method.
    pub qualified_name: String,
    pub kind: SymbolKind,
    /// The defining file.
    pub file: PathBuf,
    /// The full definition statement, decorators included.
    pub span: Span,
    /// The token carrying the name (the string contents for exports).
    pub name_span: Span,
    /// Qualified name of the enclosing symbol for nested definitions.
    pub parent: Option<String>,
    /// True when the definition sits inside a module-level `if`/`try`/`with` block.
    pub conditional: bool,
    /// Import details, present for `SymbolKind::Import`.
    pub import: Option<ImportInfo>,
    /// Export details, present for `SymbolKind::Export`.
    pub export: Option<ExportInfo>,
}

/// A definition outside the workspace: a module that is not indexed, or a builtin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ExternalModuleInfo {
    /// Dotted module path as written in the import (`os.path`, `builtins`).
    pub module: String,
    /// Imported member, `None` when the module itself is imported.
    pub name: Option<String>,
}

impl ExternalModuleInfo {
    /// The name a reference would use: the member if any, else the last module segment.
    pub fn declared_name(&self) -> &str {
        match &self.name {
            Some(n) => n,
            None => self.module.rsplit('.').next().unwrap_or(&self.module),
        }
    }

    pub fn dotted(&self) -> String {
        match &self.name {
            Some(n) => format!("{}.{}", self.module, n),
            None => self.module.clone(),
        }
    }
}

/// Metadata about a source file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub language: LanguageKind,
    /// Dotted module path (`pkg.mod`), empty when the file is outside the root.
    pub module: String,
    pub text: Arc<str>,
    pub meta: FileMeta,
    /// Recorded parse failure. Files with a parse error have no symbols.
    pub parse_error: Option<ParseError>,
}

/// A statement node: one top-level statement of a file, or one direct statement of a
/// function/class body.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StatementInfo {
    /// Grammar node kind (`function_definition`, `import_from_statement`, ...).
    pub kind: String,
    pub file: PathBuf,
    pub span: Span,
    /// Qualified name of the enclosing symbol, `None` at module level.
    pub parent: Option<String>,
}

/// Why a reference or import could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnresolvedReason {
    /// A bare name with no binding in scope.
    UnknownName,
    /// The module was found in the workspace but does not define the name.
    MissingMember { module: String },
    /// The re-export chain loops back on itself.
    CyclicImport,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::UnknownName => write!(f, "unknown name"),
            UnresolvedReason::MissingMember { module } => {
                write!(f, "module '{module}' has no such member")
            }
            UnresolvedReason::CyclicImport => write!(f, "cyclic import chain"),
        }
    }
}

/// A node in the workspace graph.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum GraphNode {
    File(FileInfo),
    Symbol(SymbolInfo),
    Statement(StatementInfo),
    /// A definition outside the workspace (terminal node).
    ExternalModule(ExternalModuleInfo),
    /// Sentinel target for references that could not be resolved. Owned by `file`.
    Unresolved {
        file: PathBuf,
        name: String,
        reason: UnresolvedReason,
    },
}

impl GraphNode {
    pub fn as_symbol(&self) -> Option<&SymbolInfo> {
        match self {
            GraphNode::Symbol(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileInfo> {
        match self {
            GraphNode::File(info) => Some(info),
            _ => None,
        }
    }
}
