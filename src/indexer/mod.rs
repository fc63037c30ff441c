pub(crate) mod incremental;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::config::GraphConfig;
use crate::error::ParseError;
use crate::graph::WorkspaceGraph;
use crate::graph::node::FileInfo;
use crate::language::{LanguageKind, module_name};
use crate::parser::{ParsedFile, parse_file};
use crate::storage::{FileMeta, Storage};

pub use incremental::RebuildReport;

/// Stage of a build reported to a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Source files were discovered; `total` is the file count.
    Discovered,
    /// One more file was read and parsed.
    Parsed,
    /// Cross-file resolution finished.
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    pub phase: BuildPhase,
    pub done: usize,
    pub total: usize,
}

/// Progress callback. Called from parse workers, so it must be `Sync`.
pub type ProgressFn<'a> = &'a (dyn Fn(BuildProgress) + Sync);

/// Everything needed to turn bytes into a parsed file.
#[derive(Debug, Clone)]
pub(crate) struct BuildContext {
    pub root: PathBuf,
    pub config: GraphConfig,
    pub source_roots: Vec<PathBuf>,
}

impl BuildContext {
    pub fn new(root: &Path, config: GraphConfig) -> Self {
        let source_roots = config.source_roots(root);
        Self {
            root: root.to_path_buf(),
            config,
            source_roots,
        }
    }

    pub fn module_of(&self, path: &Path) -> String {
        module_name(&self.source_roots, path).unwrap_or_default()
    }
}

/// A file's new contents (or its deletion) as input to a rebuild.
#[derive(Debug)]
pub(crate) enum FileChange {
    Upsert {
        path: PathBuf,
        bytes: Vec<u8>,
        meta: FileMeta,
    },
    Delete(PathBuf),
}

/// A parsed change, ready to merge.
#[derive(Debug)]
pub(crate) enum LoadedChange {
    Upsert {
        info: FileInfo,
        parsed: Option<ParsedFile>,
    },
    Delete(PathBuf),
}

impl LoadedChange {
    pub fn path(&self) -> &Path {
        match self {
            LoadedChange::Upsert { info, .. } => &info.path,
            LoadedChange::Delete(path) => path,
        }
    }
}

/// Decode and parse one file. Failures are recorded on the returned [`FileInfo`].
pub(crate) fn load_source(ctx: &BuildContext, path: &Path, bytes: Vec<u8>, meta: FileMeta) -> (FileInfo, Option<ParsedFile>) {
    let limit = ctx.config.max_file_bytes();
    let mut info = FileInfo {
        path: path.to_path_buf(),
        language: LanguageKind::from_path(path).unwrap_or(LanguageKind::Python),
        module: ctx.module_of(path),
        text: Arc::from(""),
        meta,
        parse_error: None,
    };

    if bytes.len() > limit {
        tracing::warn!(path = %path.display(), size = bytes.len(), limit, "file too large; not parsed");
        info.parse_error = Some(ParseError::TooLarge {
            path: path.to_path_buf(),
            size: bytes.len(),
            limit,
        });
        return (info, None);
    }

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!(path = %path.display(), "source is not valid UTF-8");
            info.parse_error = Some(ParseError::InvalidUtf8 {
                path: path.to_path_buf(),
            });
            return (info, None);
        }
    };

    let parsed = match parse_file(path, &text) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!("{err}");
            info.parse_error = Some(err);
            None
        }
    };
    info.text = Arc::from(text);
    (info, parsed)
}

/// Parse a batch of changes on `pool`.
pub(crate) fn load_changes(
    ctx: &BuildContext,
    pool: &rayon::ThreadPool,
    changes: Vec<FileChange>,
    progress: Option<ProgressFn<'_>>,
) -> Vec<LoadedChange> {
    let total = changes.len();
    let done = AtomicUsize::new(0);
    pool.install(|| {
        changes
            .into_par_iter()
            .map(|change| {
                let loaded = match change {
                    FileChange::Upsert { path, bytes, meta } => {
                        let (info, parsed) = load_source(ctx, &path, bytes, meta);
                        LoadedChange::Upsert { info, parsed }
                    }
                    FileChange::Delete(path) => LoadedChange::Delete(path),
                };
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(report) = progress {
                    report(BuildProgress {
                        phase: BuildPhase::Parsed,
                        done: n,
                        total,
                    });
                }
                loaded
            })
            .collect()
    })
}

/// Build the graph of a whole workspace from storage.
///
/// Files that cannot be read are logged and skipped; files that cannot be decoded or
/// parsed are kept with a recorded [`ParseError`].
///
/// # Parameters
/// - `storage`: where sources are read from
/// - `ctx`: root, configuration and source roots
/// - `pool`: the parse/resolve thread pool
/// - `progress`: optional callback invoked as the build advances
pub(crate) fn build(
    storage: &dyn Storage,
    ctx: &BuildContext,
    pool: &rayon::ThreadPool,
    progress: Option<ProgressFn<'_>>,
) -> WorkspaceGraph {
    let start = Instant::now();
    let paths = storage.discover(&ctx.root, &ctx.config);
    tracing::debug!(files = paths.len(), root = %ctx.root.display(), "discovered sources");
    if let Some(report) = progress {
        report(BuildProgress {
            phase: BuildPhase::Discovered,
            done: 0,
            total: paths.len(),
        });
    }

    let changes: Vec<FileChange> = pool.install(|| {
        paths
            .par_iter()
            .filter_map(|path| match storage.read(path) {
                Ok(bytes) => {
                    let meta = storage.metadata(path).unwrap_or_default();
                    Some(FileChange::Upsert {
                        path: path.clone(),
                        bytes,
                        meta,
                    })
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "failed to read: {err}");
                    None
                }
            })
            .collect()
    });

    let loaded = load_changes(ctx, pool, changes, progress);
    let empty = WorkspaceGraph::new(&ctx.root);
    let (graph, report) = incremental::apply_changes(&empty, loaded, pool);

    if let Some(callback) = progress {
        callback(BuildProgress {
            phase: BuildPhase::Resolved,
            done: report.rebuilt.len(),
            total: report.rebuilt.len(),
        });
    }
    let summary = graph.summary();
    tracing::info!(
        files = summary.files,
        symbols = summary.symbols,
        usages = report.stats.usages,
        parse_errors = summary.parse_errors,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "workspace indexed"
    );
    graph
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::storage::MemoryStorage;

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    #[test]
    fn test_build_records_parse_errors_and_keeps_going() {
        let storage = MemoryStorage::new()
            .with_file("/w/good.py", "def ok():\n    pass\n")
            .with_file("/w/bad.py", "def broken(:\n");
        let ctx = BuildContext::new(Path::new("/w"), GraphConfig::default());
        let graph = build(&storage, &ctx, &pool(), None);

        assert_eq!(graph.files().len(), 2);
        assert!(matches!(
            graph.parse_error(Path::new("/w/bad.py")),
            Some(ParseError::Syntax { line: 1, .. })
        ));
        assert!(graph.file_symbols(Path::new("/w/bad.py")).unwrap().is_empty());
        assert_eq!(graph.file_symbols(Path::new("/w/good.py")).unwrap().len(), 1);
    }

    #[test]
    fn test_load_source_limits_and_encoding() {
        let config = GraphConfig {
            max_file_bytes: Some(8),
            ..Default::default()
        };
        let ctx = BuildContext::new(Path::new("/w"), config);

        let (info, parsed) = load_source(&ctx, Path::new("/w/big.py"), b"x = 123456789\n".to_vec(), FileMeta::default());
        assert!(matches!(info.parse_error, Some(ParseError::TooLarge { size: 14, limit: 8, .. })));
        assert!(parsed.is_none());

        let (info, _) = load_source(&ctx, Path::new("/w/bin.py"), vec![0xff, 0xfe], FileMeta::default());
        assert!(matches!(info.parse_error, Some(ParseError::InvalidUtf8 { .. })));
    }

    #[test]
    fn test_module_names_follow_source_roots() {
        let config = GraphConfig {
            source_roots: Some(vec![PathBuf::from("src")]),
            ..Default::default()
        };
        let ctx = BuildContext::new(Path::new("/w"), config);
        assert_eq!(ctx.module_of(Path::new("/w/src/pkg/mod.py")), "pkg.mod");
        assert_eq!(ctx.module_of(Path::new("/w/tools/run.py")), "tools.run");
    }

    #[test]
    fn test_progress_is_reported() {
        let storage = MemoryStorage::new()
            .with_file("/w/a.py", "A = 1\n")
            .with_file("/w/b.py", "B = 2\n");
        let ctx = BuildContext::new(Path::new("/w"), GraphConfig::default());
        let seen = Mutex::new(Vec::new());
        let callback = |p: BuildProgress| seen.lock().unwrap().push(p.phase);
        let progress: ProgressFn<'_> = &callback;
        build(&storage, &ctx, &pool(), Some(progress));

        let phases = seen.into_inner().unwrap();
        assert_eq!(phases.first(), Some(&BuildPhase::Discovered));
        assert_eq!(phases.iter().filter(|p| **p == BuildPhase::Parsed).count(), 2);
        assert_eq!(phases.last(), Some(&BuildPhase::Resolved));
    }
}
