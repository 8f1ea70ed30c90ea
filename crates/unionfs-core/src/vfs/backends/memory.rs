//! In-memory backend.
//!
//! Holds only names, kinds and sizes; no file contents. The usage figures
//! it reports can be computed, pinned or switched off, which makes it the
//! backend of choice for exercising selection policies.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType, StatFs, Usage};

/// Default capacity of a memory backend (1 GiB).
pub const DEFAULT_CAPACITY: i64 = 1 << 30;

const BLOCK: u64 = 4096;

/// How a usage figure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Figure {
    /// Derived from the stored nodes.
    Live,
    /// Always this value.
    Fixed(i64),
    /// Not reported.
    Unsupported,
}

impl Figure {
    fn resolve(self, live: i64) -> Option<i64> {
        match self {
            Figure::Live => Some(live),
            Figure::Fixed(n) => Some(n),
            Figure::Unsupported => None,
        }
    }
}

/// In-memory backend. Contents are lost on drop.
#[derive(Debug)]
pub struct MemoryBackend {
    // Keyed by root-relative path; the root itself is the empty path.
    nodes: RwLock<BTreeMap<PathBuf, FileAttr>>,
    capacity: i64,
    free: Figure,
    objects: Figure,
    read_only: bool,
    offline: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::new(), FileAttr::new(FileType::Directory, 0));
        Self {
            nodes: RwLock::new(nodes),
            capacity: DEFAULT_CAPACITY,
            free: Figure::Live,
            objects: Figure::Live,
            read_only: false,
            offline: AtomicBool::new(false),
        }
    }

    /// Total bytes; live free space is this minus the stored file sizes.
    pub fn with_capacity(mut self, bytes: i64) -> Self {
        self.capacity = bytes;
        self
    }

    pub fn with_free_space(mut self, bytes: i64) -> Self {
        self.free = Figure::Fixed(bytes);
        self
    }

    pub fn without_free_space(mut self) -> Self {
        self.free = Figure::Unsupported;
        self
    }

    pub fn with_object_count(mut self, count: i64) -> Self {
        self.objects = Figure::Fixed(count);
        self
    }

    pub fn without_object_count(mut self) -> Self {
        self.objects = Figure::Unsupported;
        self
    }

    pub fn with_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Simulate an outage: every operation fails with an I/O error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Store a file of `size` bytes, creating parent directories.
    pub fn put_file(&self, path: impl AsRef<Path>, size: u64) -> VfsResult<FileAttr> {
        self.check_writable()?;
        self.insert(&key(path.as_ref()), FileAttr::new(FileType::File, size))
    }

    fn check_online(&self) -> VfsResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(VfsError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "backend offline",
            )));
        }
        Ok(())
    }

    fn check_writable(&self) -> VfsResult<()> {
        self.check_online()?;
        if self.read_only {
            return Err(VfsError::ReadOnly);
        }
        Ok(())
    }

    fn nodes(&self) -> VfsResult<std::sync::RwLockReadGuard<'_, BTreeMap<PathBuf, FileAttr>>> {
        self.nodes.read().map_err(|_| VfsError::other("node table poisoned"))
    }

    fn insert(&self, path: &Path, attr: FileAttr) -> VfsResult<FileAttr> {
        if path.as_os_str().is_empty() {
            return Err(VfsError::already_exists("/"));
        }
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| VfsError::other("node table poisoned"))?;

        let mut missing = Vec::new();
        for ancestor in path.ancestors().skip(1) {
            match nodes.get(ancestor) {
                Some(a) if a.is_dir() => break,
                Some(_) => return Err(VfsError::not_a_directory(ancestor.display().to_string())),
                None => missing.push(ancestor.to_path_buf()),
            }
        }
        for dir in missing {
            nodes.insert(dir, FileAttr::new(FileType::Directory, 0));
        }

        match nodes.get(path) {
            // mkdir of an existing directory succeeds
            Some(existing) if existing.is_dir() && attr.is_dir() => Ok(existing.clone()),
            Some(_) => Err(VfsError::already_exists(path.display().to_string())),
            None => {
                nodes.insert(path.to_path_buf(), attr.clone());
                Ok(attr)
            }
        }
    }
}

/// Root-relative key for `path`; `.` and `..` are resolved lexically.
fn key(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            _ => {}
        }
    }
    out
}

#[async_trait]
impl VfsOps for MemoryBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        self.check_online()?;
        let key = key(path);
        if let Some(attr) = self.nodes()?.get(&key) {
            return Ok(attr.clone());
        }
        Err(VfsError::not_found(key.display().to_string()))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        self.check_online()?;
        let dir = key(path);
        let nodes = self.nodes()?;
        match nodes.get(&dir) {
            Some(attr) if attr.is_dir() => {}
            Some(_) => return Err(VfsError::not_a_directory(dir.display().to_string())),
            None => return Err(VfsError::not_found(dir.display().to_string())),
        }

        // BTreeMap order keeps the listing sorted by name
        let entries = nodes
            .iter()
            .filter(|(p, _)| !p.as_os_str().is_empty() && p.parent() == Some(dir.as_path()))
            .filter_map(|(p, attr)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                Some(match attr.kind {
                    FileType::Directory => DirEntry::directory(name),
                    FileType::File => DirEntry::file(name, attr.size),
                })
            })
            .collect();
        Ok(entries)
    }

    async fn create(&self, path: &Path, _mode: u32) -> VfsResult<FileAttr> {
        self.check_writable()?;
        self.insert(&key(path), FileAttr::new(FileType::File, 0))
    }

    async fn mkdir(&self, path: &Path, _mode: u32) -> VfsResult<FileAttr> {
        self.check_writable()?;
        self.insert(&key(path), FileAttr::new(FileType::Directory, 0))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn statfs(&self) -> VfsResult<StatFs> {
        let usage = self.usage().await?;
        let fragments = |bytes: i64| u64::try_from(bytes).unwrap_or(0) / BLOCK;
        let free = fragments(usage.free.unwrap_or(0));
        Ok(StatFs {
            blocks: fragments(self.capacity),
            bfree: free,
            bavail: free,
            frsize: BLOCK,
        })
    }

    async fn usage(&self) -> VfsResult<Usage> {
        self.check_online()?;
        let nodes = self.nodes()?;
        let used: u64 = nodes.values().filter(|a| !a.is_dir()).map(|a| a.size).sum();
        let used = i64::try_from(used).unwrap_or(i64::MAX);
        // Everything but the root is an object
        let count = nodes.len().saturating_sub(1) as i64;

        Ok(Usage {
            total: Some(self.capacity),
            used: Some(used),
            free: self.free.resolve(self.capacity.saturating_sub(used)),
            objects: self.objects.resolve(count),
        })
    }
}
