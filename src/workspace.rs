//! The workspace: committed snapshot, storage and the parse pool.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::config::GraphConfig;
use crate::error::{TransactionError, WorkspaceError};
use crate::graph::WorkspaceGraph;
use crate::indexer::{self, BuildContext, ProgressFn};
use crate::language::LanguageKind;
use crate::storage::{FsStorage, Storage};
use crate::transaction::Transaction;
use crate::walker;

/// An indexed workspace.
///
/// Readers take [`Workspace::snapshot`] and keep it as long as they like; a commit never
/// mutates a published snapshot, it swaps in a new one.
pub struct Workspace {
    root: PathBuf,
    pub(crate) ctx: BuildContext,
    storage: Arc<dyn Storage>,
    pub(crate) pool: rayon::ThreadPool,
    snapshot: RwLock<Arc<WorkspaceGraph>>,
    pub(crate) tx_open: AtomicBool,
    pub(crate) commit_lock: Mutex<()>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("root", &self.root)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Open and index the directory `root` on the local file system, reading
    /// `program-graph.toml` from it when present.
    ///
    /// # Errors
    /// - [`WorkspaceError::RootNotFound`] if `root` is not a directory
    /// - [`WorkspaceError::Io`] if it cannot be canonicalized
    /// - [`WorkspaceError::ThreadPool`] if the parse pool cannot be started
    pub fn open(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(WorkspaceError::RootNotFound {
                path: root.to_path_buf(),
            });
        }
        let root = root.canonicalize().map_err(|source| WorkspaceError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let config = GraphConfig::load(&root);
        Self::open_with(root, Arc::new(FsStorage), config)
    }

    /// Open a workspace over any storage backend. `root` is used as given.
    pub fn open_with(
        root: impl Into<PathBuf>,
        storage: Arc<dyn Storage>,
        config: GraphConfig,
    ) -> Result<Self, WorkspaceError> {
        Self::open_with_progress(root, storage, config, None)
    }

    /// [`Self::open_with`], reporting build progress to `progress`.
    pub fn open_with_progress(
        root: impl Into<PathBuf>,
        storage: Arc<dyn Storage>,
        config: GraphConfig,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Self, WorkspaceError> {
        let root = root.into();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads().unwrap_or(0))
            .thread_name(|i| format!("program-graph-{i}"))
            .build()?;
        let ctx = BuildContext::new(&root, config);
        let graph = indexer::build(storage.as_ref(), &ctx, &pool, progress);

        Ok(Self {
            root,
            ctx,
            storage,
            pool,
            snapshot: RwLock::new(Arc::new(graph)),
            tx_open: AtomicBool::new(false),
            commit_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &GraphConfig {
        &self.ctx.config
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// The current committed graph.
    pub fn snapshot(&self) -> Arc<WorkspaceGraph> {
        let guard = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }

    /// Open the workspace's transaction.
    ///
    /// # Errors
    /// [`TransactionError::Busy`] while another transaction is alive.
    pub fn transaction(&self) -> Result<Transaction<'_>, TransactionError> {
        self.tx_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TransactionError::Busy)?;
        Ok(Transaction::new(self, self.snapshot()))
    }

    pub(crate) fn publish(&self, graph: Arc<WorkspaceGraph>) {
        let mut guard = self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = graph;
    }

    /// Absolute, lexically normalized form of `path`. Relative paths are taken from the
    /// root.
    pub(crate) fn resolve_path(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let mut out = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                other => out.push(other),
            }
        }
        out
    }

    /// True if a file at `path` would be part of the graph.
    pub(crate) fn indexes(&self, path: &Path) -> bool {
        LanguageKind::from_path(path).is_some()
            && path.starts_with(&self.root)
            && !walker::has_excluded_component(path, &self.root)
            && !walker::is_excluded_by_config(path, &self.root, &self.ctx.config)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_open_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            Workspace::open(&missing),
            Err(WorkspaceError::RootNotFound { .. })
        ));
    }

    #[test]
    fn test_open_reads_config_and_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("program-graph.toml"), "exclude = [\"gen\"]\nthreads = 2\n").unwrap();
        fs::write(dir.path().join("a.py"), "def helper():\n    pass\n").unwrap();
        fs::create_dir(dir.path().join("gen")).unwrap();
        fs::write(dir.path().join("gen/out.py"), "X = 1\n").unwrap();

        let ws = Workspace::open(dir.path()).unwrap();
        assert_eq!(ws.config().threads(), Some(2));
        let snapshot = ws.snapshot();
        assert_eq!(snapshot.files().len(), 1, "gen/ is excluded: {:?}", snapshot.files());
        assert_eq!(snapshot.generation(), 0);
        assert!(snapshot.get_symbol("helper").is_ok());
    }

    #[test]
    fn test_resolve_path_and_indexes() {
        let ws = Workspace::open_with("/w", Arc::new(MemoryStorage::new()), GraphConfig::default()).unwrap();
        assert_eq!(ws.resolve_path(Path::new("pkg/./a.py")), PathBuf::from("/w/pkg/a.py"));
        assert_eq!(ws.resolve_path(Path::new("../x.py")), PathBuf::from("/x.py"));
        assert!(ws.indexes(Path::new("/w/pkg/a.py")));
        assert!(!ws.indexes(Path::new("/w/.venv/lib.py")));
        assert!(!ws.indexes(Path::new("/w/notes.txt")));
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let storage = Arc::new(MemoryStorage::new().with_file("/w/a.py", "A = 1\n"));
        let ws = Workspace::open_with("/w", storage, GraphConfig::default()).unwrap();
        let before = ws.snapshot();

        let mut tx = ws.transaction().unwrap();
        tx.insert(Path::new("a.py"), 0, "B = 0\n").unwrap();
        tx.commit().unwrap();
        drop(tx);

        assert_eq!(before.generation(), 0);
        assert!(before.get_symbol("B").is_err(), "old snapshot unchanged");
        assert_eq!(ws.generation(), 1);
        assert!(ws.snapshot().get_symbol("B").is_ok());
    }
}
