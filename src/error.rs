//! Error taxonomy.
//!
//! Parse and resolution failures are recorded as graph state (`ParseError` on the file
//! node, `Unresolved` sentinel nodes). Mutation failures are returned synchronously and
//! leave the committed graph untouched.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::graph::node::{SymbolId, SymbolKind};

/// A file that failed to parse. Recorded on the `File` node; never fatal for the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ParseError {
    #[error("{}: unsupported file type", .path.display())]
    UnsupportedLanguage { path: PathBuf },

    #[error("{}: source is not valid UTF-8", .path.display())]
    InvalidUtf8 { path: PathBuf },

    #[error("{}: {size} bytes exceeds the {limit} byte limit", .path.display())]
    TooLarge { path: PathBuf, size: usize, limit: usize },

    #[error("{}:{line}:{column}: syntax error", .path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
    },

    #[error("{}: parser failure: {message}", .path.display())]
    Parser { path: PathBuf, message: String },
}

/// Failure to look a symbol or file up in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no symbol named '{name}'")]
    NotFound { name: String },

    #[error("'{name}' is ambiguous: {} candidates", .candidates.len())]
    Ambiguous {
        name: String,
        candidates: Vec<SymbolId>,
    },

    #[error("{} is not part of the workspace", .path.display())]
    UnknownFile { path: PathBuf },

    #[error("{id} does not exist in this snapshot")]
    StaleSymbol { id: SymbolId },

    #[error("'{name}' is a {} and not a class", .kind.as_str())]
    NotAClass { name: String, kind: SymbolKind },
}

/// Failure to open a transaction or stage an edit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("another transaction is already open")]
    Busy,

    #[error("{} is neither in the workspace nor created in this transaction", .path.display())]
    UnknownFile { path: PathBuf },

    #[error("{} already exists", .path.display())]
    FileExists { path: PathBuf },

    #[error("{} is deleted in this transaction", .path.display())]
    FileDeleted { path: PathBuf },

    #[error("{}: range {start}..{end} is outside the text (length {len})", .path.display())]
    InvalidRange {
        path: PathBuf,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("{}: offset {offset} is not on a character boundary", .path.display())]
    NotCharBoundary { path: PathBuf, offset: usize },

    #[error("{} is outside the workspace root", .path.display())]
    OutsideRoot { path: PathBuf },
}

/// Failure to materialize a commit. The graph is left unchanged.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The commit failed and restoring an already-written file failed as well.
    #[error("failed to write {}, and rollback of {} failed: {rollback}", .path.display(), .rollback_path.display())]
    RollbackFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
        rollback_path: PathBuf,
        rollback: io::Error,
    },
}

/// Failure of a move.
#[derive(Debug, Error)]
pub enum RelocationError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("'{name}' is not a top-level definition")]
    NotTopLevel { name: String },

    #[error("'{name}' is a {} and cannot be moved", .kind.as_str())]
    UnsupportedKind { name: String, kind: SymbolKind },

    #[error("'{name}' already lives in {}", .path.display())]
    SameFile { name: String, path: PathBuf },

    #[error("{} already binds '{name}'", .path.display())]
    NameCollision { name: String, path: PathBuf },

    #[error("{} is not a Python source file", .path.display())]
    UnsupportedTarget { path: PathBuf },

    #[error("{} has staged edits in this transaction; commit them first", .path.display())]
    PendingEdits { path: PathBuf },

    /// The moved symbol and a symbol staying in the origin depend on each other.
    #[error("moving '{symbol}' would leave a cycle through '{via}'; use the add-back-edge strategy")]
    CircularRelocation { symbol: String, via: String },
}

/// Failure of a rename.
#[derive(Debug, Error)]
pub enum RenameError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("'{name}' is not a valid identifier")]
    InvalidName { name: String },

    #[error("'{name}' is a {} and cannot be renamed", .kind.as_str())]
    UnsupportedKind { name: String, kind: SymbolKind },

    #[error("'{name}' is already bound in {}", .path.display())]
    RenameConflict { name: String, path: PathBuf },

    #[error("{} has staged edits in this transaction; commit them first", .path.display())]
    PendingEdits { path: PathBuf },
}

/// Failure to open a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace root {} does not exist or is not a directory", .path.display())]
    RootNotFound { path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build the parser thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
