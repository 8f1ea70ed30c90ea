//! Host directory backend.
//!
//! Serves an upstream from a directory on the local machine. Paths that
//! would leave the directory, lexically or through a symlink, are refused.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType, StatFs};

/// Backend rooted at a host directory such as `/mnt/disk1`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
}

impl LocalBackend {
    /// Serve `root`. It is canonicalised when it exists, so symlinked
    /// mount points compare correctly.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            read_only: false,
        }
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a backend path to a host path inside the root.
    async fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::ParentDir => {
                    if !relative.pop() {
                        return Err(VfsError::PathEscapesRoot(path.display().to_string()));
                    }
                }
                Component::RootDir | Component::CurDir => {}
                Component::Prefix(_) => {
                    return Err(VfsError::invalid_path(path.display().to_string()));
                }
            }
        }
        let full = self.root.join(&relative);

        // Symlinks can only hide in the part that exists; canonicalise the
        // deepest existing ancestor and check it stays under the root.
        let mut existing = full.as_path();
        while !fs::try_exists(existing).await.unwrap_or(false) {
            match existing.parent() {
                Some(parent) if parent.starts_with(&self.root) => existing = parent,
                _ => return Ok(full),
            }
        }
        let canonical = dunce::canonicalize(existing)?;
        if !canonical.starts_with(&self.root) {
            return Err(VfsError::PathEscapesRoot(path.display().to_string()));
        }
        match full.strip_prefix(existing) {
            Ok(rest) if !rest.as_os_str().is_empty() => Ok(canonical.join(rest)),
            // Joining an empty tail would append a separator
            _ => Ok(canonical),
        }
    }

    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            return Err(VfsError::ReadOnly);
        }
        Ok(())
    }
}

fn attr_of(meta: &std::fs::Metadata) -> FileAttr {
    if meta.is_dir() {
        FileAttr::new(FileType::Directory, 0)
    } else {
        FileAttr::new(FileType::File, meta.len())
    }
}

#[async_trait]
impl VfsOps for LocalBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let host = self.resolve(path).await?;
        Ok(attr_of(&fs::metadata(&host).await?))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let host = self.resolve(path).await?;
        let mut dir = fs::read_dir(&host).await?;
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Follows symlinks; dangling links are left out
            let Ok(meta) = fs::metadata(entry.path()).await else {
                tracing::trace!(%name, dir = %host.display(), "skipping dangling entry");
                continue;
            };
            entries.push(if meta.is_dir() {
                DirEntry::directory(name)
            } else {
                DirEntry::file(name, meta.len())
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        self.check_writable()?;
        let host = self.resolve(path).await?;
        if let Some(parent) = host.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(&host)
            .await?;
        Ok(attr_of(&file.metadata().await?))
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        self.check_writable()?;
        let host = self.resolve(path).await?;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(&host)
            .await?;
        Ok(attr_of(&fs::metadata(&host).await?))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn statfs(&self) -> VfsResult<StatFs> {
        let st = rustix::fs::statvfs(&self.root).map_err(|e| VfsError::Io(e.into()))?;
        Ok(StatFs {
            blocks: st.f_blocks,
            bfree: st.f_bfree,
            bavail: st.f_bavail,
            frsize: st.f_frsize,
        })
    }

    fn host_path(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix("/").unwrap_or(path);
        Some(self.root.join(relative))
    }
}
