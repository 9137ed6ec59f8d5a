//! Byte loading and name resolution.
//!
//! The cache never touches files itself. A [`PathResolver`] turns a logical
//! asset name into a path at `create` time, and a [`ByteLoader`] turns that
//! path into a payload during the flush.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::ensure;
use bytes::Bytes;

/// Why an entity could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The loader has nothing at this path.
    NotFound(PathBuf),
    /// The loader failed for another IO reason.
    Io { path: PathBuf, kind: io::ErrorKind },
    /// The payload exists but is zero bytes long.
    Empty,
    /// The payload ended before a field could be read.
    Truncated { needed: usize, remaining: usize },
    /// The payload is structurally wrong.
    Malformed(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(path) => write!(f, "{} not found", path.display()),
            LoadError::Io { path, kind } => write!(f, "reading {} failed: {kind}", path.display()),
            LoadError::Empty => write!(f, "payload is empty"),
            LoadError::Truncated { needed, remaining } => write!(
                f,
                "payload truncated: needed {needed} bytes, {remaining} remaining"
            ),
            LoadError::Malformed(reason) => write!(f, "malformed payload: {reason}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Source of asset payloads.
pub trait ByteLoader {
    /// Called once from `ResourceCache::initialize`.
    fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Bytes, LoadError>;
}

/// Maps logical names to loader paths.
pub trait PathResolver {
    fn resolve(&self, name: &str) -> PathBuf;
}

/// Resolves `name` to `<cache_dir>/<name>`.
#[derive(Debug, Clone)]
pub struct CacheDirResolver {
    dir: PathBuf,
}

impl CacheDirResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PathResolver for CacheDirResolver {
    fn resolve(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

/// Reads payloads from disk below a root directory.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ByteLoader for FileSystemLoader {
    fn initialize(&self) -> anyhow::Result<()> {
        ensure!(
            self.root.is_dir(),
            "resource root {} is not a directory",
            self.root.display()
        );
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Bytes, LoadError> {
        let full = self.root.join(path);
        match std::fs::read(&full) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(LoadError::NotFound(full)),
            Err(e) => Err(LoadError::Io {
                path: full,
                kind: e.kind(),
            }),
        }
    }
}

/// In-memory payload store.
///
/// Clones share storage, so a caller can keep one to add files or inspect
/// load attempts after handing another to the cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: Rc<RefCell<HashMap<PathBuf, Bytes>>>,
    attempts: Rc<RefCell<HashMap<PathBuf, usize>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Bytes>) {
        self.files.borrow_mut().insert(path.into(), data.into());
    }

    pub fn remove(&self, path: &Path) -> Option<Bytes> {
        self.files.borrow_mut().remove(path)
    }

    /// Number of `load` calls made for `path`, found or not.
    pub fn attempts(&self, path: &Path) -> usize {
        self.attempts.borrow().get(path).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.borrow().values().sum()
    }
}

impl ByteLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<Bytes, LoadError> {
        *self
            .attempts
            .borrow_mut()
            .entry(path.to_path_buf())
            .or_insert(0) += 1;
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
    }
}
