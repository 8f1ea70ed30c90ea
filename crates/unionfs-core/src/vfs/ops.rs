//! Backend operations trait.
//!
//! Every upstream of a union is driven through this trait. Paths are
//! relative to the backend's root; a leading `/` is ignored.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::types::{DirEntry, FileAttr, StatFs, Usage};
use super::VfsResult;

/// What the union needs from a storage backend.
///
/// Selection only ever looks things up; `create` and `mkdir` exist so
/// callers can act on a decision and so tests can populate backends.
#[async_trait]
pub trait VfsOps: Send + Sync {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Entries of the directory at `path`, sorted by name.
    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Create an empty file; missing parent directories are created.
    async fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Create a directory and its missing parents.
    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    fn read_only(&self) -> bool;

    async fn statfs(&self) -> VfsResult<StatFs>;

    /// Where `path` lives on the host, for backends that map onto one.
    fn host_path(&self, _path: &Path) -> Option<PathBuf> {
        None
    }

    /// Capacity figures used by selection policies.
    ///
    /// The default derives byte figures from [`statfs`](Self::statfs) and
    /// leaves the object count unknown.
    async fn usage(&self) -> VfsResult<Usage> {
        let st = self.statfs().await?;
        Ok(Usage::from(&st))
    }

    /// Whether anything lives at `path`.
    ///
    /// Absence is `Ok(false)`; any other backend failure is returned.
    async fn exists(&self, path: &Path) -> VfsResult<bool> {
        match self.getattr(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_absent() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
