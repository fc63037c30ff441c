//! Storage backends the workspace reads sources from and commits edits to.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use crate::config::GraphConfig;
use crate::language::LanguageKind;
use crate::walker;

/// Change metadata of a file: modification time (seconds since the epoch) and byte size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FileMeta {
    pub mtime_secs: u64,
    pub size: u64,
}

/// Where source text lives. The workspace never touches the file system directly.
pub trait Storage: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the contents of `path`, creating it (and missing parent directories).
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;

    /// Source files of the workspace rooted at `root`, sorted.
    fn discover(&self, root: &Path, config: &GraphConfig) -> Vec<PathBuf> {
        walker::discover(root, config)
    }
}

/// The local file system. Writes are atomic: temp file in the same directory, then rename.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let metadata = std::fs::metadata(path)?;
        let mtime_secs = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(FileMeta {
            mtime_secs,
            size: metadata.len(),
        })
    }
}

/// An in-memory file map. Each write bumps a logical clock used as the mtime.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<PathBuf, (Vec<u8>, u64)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without going through [`Storage::write`].
    pub fn with_file(self, path: impl Into<PathBuf>, text: &str) -> Self {
        self.lock().insert(path.into(), (text.as_bytes().to_vec(), 0));
        self
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, (Vec<u8>, u64)>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    )
}

impl Storage for MemoryStorage {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.lock()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut files = self.lock();
        let clock = files.values().map(|(_, t)| *t).max().unwrap_or(0) + 1;
        files.insert(path.to_path_buf(), (contents.to_vec(), clock));
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        self.lock()
            .get(path)
            .map(|(bytes, t)| FileMeta {
                mtime_secs: *t,
                size: bytes.len() as u64,
            })
            .ok_or_else(|| not_found(path))
    }

    fn discover(&self, root: &Path, config: &GraphConfig) -> Vec<PathBuf> {
        self.lock()
            .keys()
            .filter(|p| p.starts_with(root))
            .filter(|p| LanguageKind::from_path(p).is_some())
            .filter(|p| !walker::has_excluded_component(p, root))
            .filter(|p| !walker::is_excluded_by_config(p, root, config))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_write_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg").join("sub").join("m.py");

        FsStorage.write(&path, b"x = 1\n").unwrap();
        assert_eq!(FsStorage.read(&path).unwrap(), b"x = 1\n");

        FsStorage.write(&path, b"x = 2\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 2\n");

        let meta = FsStorage.metadata(&path).unwrap();
        assert_eq!(meta.size, 6);
        assert!(meta.mtime_secs > 0);
    }

    #[test]
    fn test_fs_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        FsStorage.write(&dir.path().join("a.py"), b"pass\n").unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "only the target file should remain");
    }

    #[test]
    fn test_fs_remove_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        assert!(!FsStorage.exists(&path));
        FsStorage.write(&path, b"").unwrap();
        assert!(FsStorage.exists(&path));
        FsStorage.remove(&path).unwrap();
        assert!(!FsStorage.exists(&path));
        assert!(FsStorage.remove(&path).is_err());
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new().with_file("/w/a.py", "a = 1\n");
        assert!(storage.exists(Path::new("/w/a.py")));
        assert_eq!(storage.read(Path::new("/w/a.py")).unwrap(), b"a = 1\n");

        storage.write(Path::new("/w/b.py"), b"b = 2\n").unwrap();
        let meta_b = storage.metadata(Path::new("/w/b.py")).unwrap();
        assert_eq!(meta_b.size, 6);
        assert!(meta_b.mtime_secs > 0);

        storage.write(Path::new("/w/notes.txt"), b"").unwrap();
        storage.write(Path::new("/w/__pycache__/b.py"), b"").unwrap();
        assert_eq!(
            storage.discover(Path::new("/w"), &GraphConfig::default()),
            vec![PathBuf::from("/w/a.py"), PathBuf::from("/w/b.py")]
        );
        storage.remove(Path::new("/w/notes.txt")).unwrap();
        storage.remove(Path::new("/w/__pycache__/b.py")).unwrap();

        storage.remove(Path::new("/w/a.py")).unwrap();
        assert_eq!(storage.paths(), vec![PathBuf::from("/w/b.py")]);
        assert_eq!(
            storage.read(Path::new("/w/a.py")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}
