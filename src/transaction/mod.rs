//! Staged edits and the commit protocol.
//!
//! A [`Transaction`] collects edits in memory. Nothing reaches storage or the graph until
//! [`Transaction::commit`], which writes every touched file, rolls back on the first write
//! failure, and publishes a rebuilt snapshot.

pub mod edit;

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use indexmap::IndexMap;

use crate::error::{CommitError, TransactionError};
use crate::graph::WorkspaceGraph;
use crate::indexer::{FileChange, incremental, load_changes};
use crate::workspace::Workspace;

pub use edit::Edit;
pub(crate) use edit::EditBatch;
use edit::splice;

/// Files a commit wrote, and what was rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFiles {
    pub modified: Vec<PathBuf>,
    pub created: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    /// Files whose graph edges were recomputed, the written ones included.
    pub rebuilt: Vec<PathBuf>,
    /// Generation of the snapshot after the commit.
    pub generation: u64,
}

impl ChangedFiles {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.created.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No pending edits.
    Clean,
    Staged,
}

/// Pending state of one touched file.
#[derive(Debug, Clone)]
struct FileState {
    /// Committed text, `None` if the file does not exist yet.
    original: Option<Arc<str>>,
    /// Text after the staged edits, `None` once deleted.
    current: Option<String>,
    edits: Vec<Edit>,
}

/// The single open edit session of a [`Workspace`].
///
/// Dropping a transaction discards its pending edits and releases the workspace for the
/// next one.
pub struct Transaction<'w> {
    workspace: &'w Workspace,
    base: Arc<WorkspaceGraph>,
    files: IndexMap<PathBuf, FileState>,
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("generation", &self.base.generation())
            .field("pending", &self.files.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<'w> Transaction<'w> {
    pub(crate) fn new(workspace: &'w Workspace, base: Arc<WorkspaceGraph>) -> Self {
        Self {
            workspace,
            base,
            files: IndexMap::new(),
        }
    }

    /// The committed snapshot edits are staged against.
    pub fn snapshot(&self) -> &Arc<WorkspaceGraph> {
        &self.base
    }

    pub fn state(&self) -> TransactionState {
        if self.files.is_empty() {
            TransactionState::Clean
        } else {
            TransactionState::Staged
        }
    }

    /// Touched files in the order they were first touched.
    pub fn pending_files(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// True if `path` has staged edits.
    pub fn has_pending(&self, path: &Path) -> bool {
        self.files.contains_key(&self.workspace.resolve_path(path))
    }

    /// Staged edits of one file, in order.
    pub fn edits(&self, path: &Path) -> &[Edit] {
        self.files
            .get(&self.workspace.resolve_path(path))
            .map(|s| s.edits.as_slice())
            .unwrap_or(&[])
    }

    /// Text of `path` as seen through the staged edits. `None` if the file does not exist
    /// (never did, or is deleted in this transaction).
    pub fn current_text(&self, path: &Path) -> Option<&str> {
        let path = self.workspace.resolve_path(path);
        match self.files.get(&path) {
            Some(state) => state.current.as_deref(),
            None => self.base.text(&path),
        }
    }

    fn checked_path(&self, path: &Path) -> Result<PathBuf, TransactionError> {
        let resolved = self.workspace.resolve_path(path);
        if !resolved.starts_with(self.workspace.root()) {
            return Err(TransactionError::OutsideRoot { path: resolved });
        }
        Ok(resolved)
    }

    /// Pending state of an existing file, created on first touch.
    fn state_mut(&mut self, path: &Path) -> Result<&mut FileState, TransactionError> {
        if !self.files.contains_key(path) {
            let text = self
                .base
                .file(path)
                .map(|f| Arc::clone(&f.text))
                .ok_or_else(|| TransactionError::UnknownFile {
                    path: path.to_path_buf(),
                })?;
            self.files.insert(
                path.to_path_buf(),
                FileState {
                    current: Some(text.to_string()),
                    original: Some(text),
                    edits: Vec::new(),
                },
            );
        }
        self.files.get_mut(path).ok_or_else(|| TransactionError::UnknownFile {
            path: path.to_path_buf(),
        })
    }

    /// Stage a replacement of `range` (byte offsets into the current text) with `text`.
    ///
    /// # Errors
    /// - [`TransactionError::UnknownFile`] if the file is neither indexed nor created here
    /// - [`TransactionError::FileDeleted`] if it was deleted in this transaction
    /// - [`TransactionError::InvalidRange`] / [`TransactionError::NotCharBoundary`]
    pub fn stage_edit(&mut self, path: &Path, range: Range<usize>, text: &str) -> Result<(), TransactionError> {
        let path = self.checked_path(path)?;
        let state = self.state_mut(&path)?;
        let Some(current) = state.current.as_mut() else {
            return Err(TransactionError::FileDeleted { path });
        };
        splice(&path, current, range.clone(), text)?;
        state.edits.push(Edit::Replace {
            range,
            text: text.to_owned(),
        });
        Ok(())
    }

    pub fn insert(&mut self, path: &Path, offset: usize, text: &str) -> Result<(), TransactionError> {
        self.stage_edit(path, offset..offset, text)
    }

    pub fn delete_range(&mut self, path: &Path, range: Range<usize>) -> Result<(), TransactionError> {
        self.stage_edit(path, range, "")
    }

    /// Stage creation of a new file under the workspace root.
    ///
    /// # Errors
    /// [`TransactionError::FileExists`] if the path exists in storage or in this
    /// transaction; [`TransactionError::OutsideRoot`] for paths outside the root.
    pub fn create_file(&mut self, path: &Path, text: &str) -> Result<(), TransactionError> {
        let path = self.checked_path(path)?;
        let exists = match self.files.get(&path) {
            Some(state) => state.current.is_some(),
            None => self.base.contains_file(&path) || self.workspace.storage().exists(&path),
        };
        if exists {
            return Err(TransactionError::FileExists { path });
        }
        let state = self.files.entry(path).or_insert_with(|| FileState {
            original: None,
            current: None,
            edits: Vec::new(),
        });
        state.current = Some(text.to_owned());
        state.edits.push(Edit::CreateFile {
            text: text.to_owned(),
        });
        Ok(())
    }

    /// Stage deletion of a file.
    pub fn delete_file(&mut self, path: &Path) -> Result<(), TransactionError> {
        let path = self.checked_path(path)?;
        let state = self.state_mut(&path)?;
        if state.current.take().is_none() {
            return Err(TransactionError::FileDeleted { path });
        }
        state.edits.push(Edit::DeleteFile);
        Ok(())
    }

    pub(crate) fn workspace(&self) -> &'w Workspace {
        self.workspace
    }

    /// Stage a batch planned against the committed text. Either every edit of the batch is
    /// staged or, on the first failure, none is.
    pub(crate) fn stage_batch(&mut self, batch: EditBatch) -> Result<(), TransactionError> {
        let saved = self.files.clone();
        let result = self.stage_batch_inner(batch);
        if result.is_err() {
            self.files = saved;
        }
        result
    }

    fn stage_batch_inner(&mut self, batch: EditBatch) -> Result<(), TransactionError> {
        for (path, text) in &batch.created {
            self.create_file(path, text)?;
        }
        for (path, edits) in &batch.edits {
            for (range, text) in EditBatch::ordered(edits) {
                self.stage_edit(path, range, &text)?;
            }
        }
        Ok(())
    }

    /// Discard every pending edit. Storage and the graph are untouched.
    pub fn reset(&mut self) {
        if !self.files.is_empty() {
            tracing::debug!(files = self.files.len(), "transaction reset");
        }
        self.files.clear();
    }

    /// Write every pending edit and publish the rebuilt snapshot.
    ///
    /// Files are written in the order they were first touched. If a write fails, every
    /// file already written by this commit is restored and the snapshot is left as it was;
    /// the pending edits are kept so the caller can retry or reset. A commit with no net
    /// change returns immediately without touching the snapshot.
    ///
    /// # Errors
    /// - [`CommitError::Io`] if a write failed and was rolled back
    /// - [`CommitError::RollbackFailed`] if restoring an earlier file failed too
    pub fn commit(&mut self) -> Result<ChangedFiles, CommitError> {
        let workspace = self.workspace;
        let _serial = workspace
            .commit_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let start = Instant::now();

        let mut changes = ChangedFiles {
            generation: self.base.generation(),
            ..Default::default()
        };
        let ops: Vec<(PathBuf, Option<Arc<str>>, Option<String>)> = self
            .files
            .iter()
            .filter(|(_, s)| match (&s.original, &s.current) {
                (Some(original), Some(current)) => **original != **current,
                (None, None) => false,
                _ => true,
            })
            .map(|(p, s)| (p.clone(), s.original.clone(), s.current.clone()))
            .collect();
        if ops.is_empty() {
            self.files.clear();
            return Ok(changes);
        }

        let storage = workspace.storage();
        let mut written: Vec<(&Path, &Option<Arc<str>>)> = Vec::new();
        for (path, original, current) in &ops {
            let result = match current {
                Some(text) => storage.write(path, text.as_bytes()),
                None => storage.remove(path),
            };
            if let Err(source) = result {
                tracing::warn!(path = %path.display(), "write failed, rolling back: {source}");
                return Err(rollback(storage, &written, path, source));
            }
            written.push((path, original));
        }

        let mut file_changes = Vec::new();
        for (path, original, current) in ops {
            match (&original, current) {
                (None, Some(_)) => changes.created.push(path.clone()),
                (Some(_), Some(_)) => changes.modified.push(path.clone()),
                (_, None) => changes.deleted.push(path.clone()),
            }
            if !self.base.contains_file(&path) && !workspace.indexes(&path) {
                continue;
            }
            let change = match storage.read(&path) {
                Ok(bytes) => FileChange::Upsert {
                    meta: storage.metadata(&path).unwrap_or_default(),
                    path,
                    bytes,
                },
                Err(_) if self.base.contains_file(&path) => FileChange::Delete(path),
                Err(_) => continue,
            };
            file_changes.push(change);
        }

        let loaded = load_changes(&workspace.ctx, &workspace.pool, file_changes, None);
        let (mut graph, report) = incremental::apply_changes(&self.base, loaded, &workspace.pool);
        graph.generation = self.base.generation() + 1;
        let graph = Arc::new(graph);
        workspace.publish(Arc::clone(&graph));

        changes.rebuilt = report.rebuilt;
        changes.generation = graph.generation();
        tracing::info!(
            generation = changes.generation,
            modified = changes.modified.len(),
            created = changes.created.len(),
            deleted = changes.deleted.len(),
            rebuilt = changes.rebuilt.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "commit applied"
        );

        self.base = graph;
        self.files.clear();
        Ok(changes)
    }
}

/// Restore every file in `written` (newest first) after a failed write of `failed`.
fn rollback(
    storage: &dyn crate::storage::Storage,
    written: &[(&Path, &Option<Arc<str>>)],
    failed: &Path,
    source: std::io::Error,
) -> CommitError {
    for (path, original) in written.iter().rev() {
        let restored = match original {
            Some(text) => storage.write(path, text.as_bytes()),
            None => storage.remove(path),
        };
        if let Err(rollback) = restored {
            tracing::warn!(path = %path.display(), "rollback failed: {rollback}");
            return CommitError::RollbackFailed {
                path: failed.to_path_buf(),
                source,
                rollback_path: path.to_path_buf(),
                rollback,
            };
        }
    }
    CommitError::Io {
        path: failed.to_path_buf(),
        source,
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.reset();
        self.workspace.tx_open.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::GraphConfig;
    use crate::storage::{MemoryStorage, Storage};

    fn workspace(files: &[(&str, &str)]) -> (Workspace, Arc<MemoryStorage>) {
        let storage = Arc::new(
            files
                .iter()
                .fold(MemoryStorage::new(), |s, (p, t)| s.with_file(*p, t)),
        );
        let ws = Workspace::open_with("/w", storage.clone(), GraphConfig::default()).unwrap();
        (ws, storage)
    }

    #[test]
    fn test_only_one_transaction_at_a_time() {
        let (ws, _) = workspace(&[("/w/a.py", "A = 1\n")]);
        let tx = ws.transaction().unwrap();
        assert!(matches!(ws.transaction(), Err(TransactionError::Busy)));
        drop(tx);
        assert!(ws.transaction().is_ok(), "dropping releases the workspace");
    }

    #[test]
    fn test_edits_see_previous_edits() {
        let (ws, storage) = workspace(&[("/w/a.py", "A = 1\n")]);
        let mut tx = ws.transaction().unwrap();
        tx.insert(Path::new("/w/a.py"), 6, "B = 2\n").unwrap();
        tx.stage_edit(Path::new("/w/a.py"), 10..11, "3").unwrap();
        assert_eq!(tx.current_text(Path::new("/w/a.py")), Some("A = 1\nB = 3\n"));
        assert_eq!(tx.edits(Path::new("/w/a.py")).len(), 2);
        assert_eq!(storage.read(Path::new("/w/a.py")).unwrap(), b"A = 1\n", "nothing written before commit");
        assert!(ws.snapshot().get_symbol("B").is_err(), "graph untouched before commit");

        let changed = tx.commit().unwrap();
        assert_eq!(changed.modified, vec![PathBuf::from("/w/a.py")]);
        assert_eq!(changed.generation, 1);
        assert!(ws.snapshot().get_symbol("B").is_ok());
        assert_eq!(tx.state(), TransactionState::Clean);
    }

    #[test]
    fn test_stage_and_reset_is_a_no_op() {
        let (ws, storage) = workspace(&[("/w/a.py", "def only():\n    pass\n")]);
        let before = ws.snapshot();
        let mut tx = ws.transaction().unwrap();
        let len = tx.current_text(Path::new("/w/a.py")).unwrap().len();
        tx.delete_range(Path::new("/w/a.py"), 0..len).unwrap();
        tx.reset();
        assert_eq!(tx.commit().unwrap(), ChangedFiles::default());

        assert!(Arc::ptr_eq(&before, &ws.snapshot()), "same snapshot");
        assert_eq!(storage.read(Path::new("/w/a.py")).unwrap(), b"def only():\n    pass\n");
        assert_eq!(ws.snapshot().file_symbols(Path::new("/w/a.py")).unwrap().len(), 1);
    }

    #[test]
    fn test_edit_that_restores_the_text_is_not_written() {
        let (ws, _) = workspace(&[("/w/a.py", "A = 1\n")]);
        let mut tx = ws.transaction().unwrap();
        tx.stage_edit(Path::new("/w/a.py"), 4..5, "2").unwrap();
        tx.stage_edit(Path::new("/w/a.py"), 4..5, "1").unwrap();
        let changed = tx.commit().unwrap();
        assert!(changed.is_empty());
        assert_eq!(ws.generation(), 0);
    }

    #[test]
    fn test_create_and_delete_files() {
        let (ws, storage) = workspace(&[("/w/a.py", "A = 1\n")]);
        let mut tx = ws.transaction().unwrap();
        assert!(matches!(
            tx.create_file(Path::new("/w/a.py"), ""),
            Err(TransactionError::FileExists { .. })
        ));
        assert!(matches!(
            tx.create_file(Path::new("/elsewhere/x.py"), ""),
            Err(TransactionError::OutsideRoot { .. })
        ));
        tx.create_file(Path::new("/w/pkg/b.py"), "B = 2\n").unwrap();
        tx.delete_file(Path::new("/w/a.py")).unwrap();
        assert!(matches!(
            tx.insert(Path::new("/w/a.py"), 0, "x"),
            Err(TransactionError::FileDeleted { .. })
        ));
        assert!(matches!(
            tx.insert(Path::new("/w/nope.py"), 0, "x"),
            Err(TransactionError::UnknownFile { .. })
        ));

        let changed = tx.commit().unwrap();
        assert_eq!(changed.created, vec![PathBuf::from("/w/pkg/b.py")]);
        assert_eq!(changed.deleted, vec![PathBuf::from("/w/a.py")]);
        assert!(!storage.exists(Path::new("/w/a.py")));
        let snapshot = ws.snapshot();
        assert_eq!(snapshot.files(), vec![PathBuf::from("/w/pkg/b.py")]);
        assert_eq!(snapshot.get_symbol("pkg.b.B").unwrap().name, "B");
    }
}
