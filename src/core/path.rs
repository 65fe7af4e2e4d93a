//! Path & file-identity layer.
//!
//! All downstream components address files through [`FileRef`]/[`DirRef`]
//! rather than raw `PathBuf`s so that equality, hashing, and change
//! detection are deterministic: two references built from differently
//!-cased or differently-separated strings that name the same file compare
//! equal. An `Exists`/`LastWriteTime` cache avoids re-`stat`ing the same
//! path across the many traversals the pipeline makes over the module
//! graph.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::SystemTime;

use std::collections::HashMap;

/// Normalize a path to a comparison key: absolute, with `.`/`..` resolved
/// where possible and separators unified, lower-cased for case-insensitive
/// comparison. This is a logic error for a relative path with no base -
/// every reference into the module graph is meant to be anchored.
fn normalize_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

/// A canonicalized, case-insensitively-comparable reference to a file.
/// Constructing one from a relative path without a base is a logic error
/// (`FileRef::new` panics) - every file the pipeline touches is reachable
/// from a known root (engine dir, project dir, module dir, ...).
#[derive(Clone)]
pub struct FileRef {
    path: PathBuf,
    key: String,
}

impl FileRef {
    /// Build a reference from an already-absolute path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        assert!(
            path.is_absolute(),
            "FileRef requires an absolute path, got {}",
            path.display()
        );
        let key = normalize_key(&path);
        FileRef { path, key }
    }

    /// Build a reference relative to `base`, which must itself be absolute.
    pub fn combine(base: &DirRef, relative: impl AsRef<Path>) -> Self {
        Self::new(base.as_path().join(relative))
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|s| s.to_str())
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|s| s.to_str())
    }

    pub fn parent_dir(&self) -> Option<DirRef> {
        self.path.parent().map(DirRef::new)
    }

    pub fn exists(&self) -> bool {
        STAT_CACHE.exists(&self.path)
    }

    pub fn last_write_time(&self) -> Option<SystemTime> {
        STAT_CACHE.last_write_time(&self.path)
    }
}

impl fmt::Debug for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileRef({})", self.path.display())
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl PartialEq for FileRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for FileRef {}

impl std::hash::Hash for FileRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for FileRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for FileRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

/// A canonicalized, case-insensitively-comparable reference to a directory.
#[derive(Clone)]
pub struct DirRef {
    path: PathBuf,
    key: String,
}

impl DirRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        assert!(
            path.is_absolute(),
            "DirRef requires an absolute path, got {}",
            path.display()
        );
        let key = normalize_key(&path);
        DirRef { path, key }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, relative: impl AsRef<Path>) -> DirRef {
        DirRef::new(self.path.join(relative))
    }

    pub fn file(&self, relative: impl AsRef<Path>) -> FileRef {
        FileRef::new(self.path.join(relative))
    }

    pub fn parent(&self) -> Option<DirRef> {
        self.path.parent().map(DirRef::new)
    }

    pub fn exists(&self) -> bool {
        STAT_CACHE.exists(&self.path)
    }

    /// `true` iff `other` names a path at or beneath this directory.
    pub fn contains(&self, other: &Path) -> bool {
        let other_key = normalize_key(other);
        other_key == self.key || other_key.starts_with(&format!("{}/", self.key))
    }
}

impl fmt::Debug for DirRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirRef({})", self.path.display())
    }
}

impl fmt::Display for DirRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl PartialEq for DirRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for DirRef {}

impl std::hash::Hash for DirRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for DirRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DirRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedStat {
    exists: bool,
    mtime: Option<SystemTime>,
}

/// Process-wide `Exists`/`LastWriteTime` cache, keyed by normalized path.
/// Populated lazily on first query; there is no invalidation because a
/// single driver invocation only ever reads the filesystem state it
/// observed at the start of graph construction.
struct StatCache {
    entries: RwLock<HashMap<String, CachedStat>>,
}

impl StatCache {
    fn new() -> Self {
        StatCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn stat(&self, path: &Path) -> CachedStat {
        let key = normalize_key(path);
        if let Some(cached) = self.entries.read().unwrap().get(&key) {
            return *cached;
        }
        let metadata = std::fs::metadata(path);
        let cached = CachedStat {
            exists: metadata.is_ok(),
            mtime: metadata.ok().and_then(|m| m.modified().ok()),
        };
        self.entries.write().unwrap().insert(key, cached);
        cached
    }

    fn exists(&self, path: &Path) -> bool {
        self.stat(path).exists
    }

    fn last_write_time(&self, path: &Path) -> Option<SystemTime> {
        self.stat(path).mtime
    }
}

static STAT_CACHE: LazyLock<StatCache> = LazyLock::new(StatCache::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_refs_compare_case_insensitively() {
        let a = FileRef::new("/engine/Source/Core/Foo.cpp");
        let b = FileRef::new("/Engine/source/CORE/foo.cpp");
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic]
    fn relative_path_is_a_logic_error() {
        FileRef::new("Source/Foo.cpp");
    }

    #[test]
    fn dir_ref_contains_checks_prefix() {
        let root = DirRef::new("/engine/Source");
        assert!(root.contains(Path::new("/engine/Source/Core/Foo.cpp")));
        assert!(!root.contains(Path::new("/engine/Plugins/Foo.cpp")));
    }

    #[test]
    fn stat_cache_reports_existence() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("exists.txt");
        std::fs::write(&path, "x").unwrap();
        let present = FileRef::new(&path);
        assert!(present.exists());
        assert!(present.last_write_time().is_some());

        let missing = FileRef::new(tmp.path().join("missing.txt"));
        assert!(!missing.exists());
    }
}
