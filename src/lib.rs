//! Program graph engine for Python workspaces.
//!
//! A [`Workspace`] parses a source tree into a [`WorkspaceGraph`] of files, symbols and
//! statements with usage, import, export and inheritance edges. Snapshots are immutable
//! and cheap to share; changes go through a [`Transaction`], which stages text edits and
//! structured refactorings (move, rename, delete) and publishes a rebuilt snapshot on
//! commit.
//!
//! ```no_run
//! use program_graph::{RelocationStrategy, UsageKind, Workspace};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ws = Workspace::open("path/to/project")?;
//! let snapshot = ws.snapshot();
//! let helper = snapshot.get_symbol("helper")?;
//! println!("{} usages", snapshot.usages(helper.id, UsageKind::any())?.len());
//!
//! let mut tx = ws.transaction()?;
//! tx.move_symbol(helper.id, "util.py".as_ref(), RelocationStrategy::UpdateAllImports, true)?;
//! let changed = tx.commit()?;
//! println!("rebuilt {} files", changed.rebuilt.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod language;
pub mod logging;
pub mod parser;
pub mod query;
pub mod relocation;
pub(crate) mod resolver;
pub mod storage;
pub mod transaction;
pub mod walker;
pub mod workspace;

pub use config::GraphConfig;
pub use error::{CommitError, LookupError, ParseError, RelocationError, RenameError, TransactionError, WorkspaceError};
pub use graph::edge::{EdgeKind, UsageEdge, UsageKind};
pub use graph::node::{Span, SymbolId, SymbolKind, UnresolvedReason};
pub use graph::{AmbiguousBinding, FileReference, GraphSummary, Symbol, UnresolvedName, WorkspaceGraph};
pub use indexer::{BuildPhase, BuildProgress};
pub use query::{MethodResolution, UsageRecord};
pub use relocation::RelocationStrategy;
pub use resolver::ResolveStats;
pub use storage::{FileMeta, FsStorage, MemoryStorage, Storage};
pub use transaction::{ChangedFiles, Edit, Transaction, TransactionState};
pub use workspace::Workspace;
