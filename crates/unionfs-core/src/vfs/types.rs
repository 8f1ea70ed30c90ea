//! Values exchanged with backends.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
}

impl FileType {
    pub fn is_dir(self) -> bool {
        self == FileType::Directory
    }
}

/// Metadata of one object on a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttr {
    pub size: u64,
    pub kind: FileType,
}

impl FileAttr {
    pub(crate) fn new(kind: FileType, size: u64) -> Self {
        Self { size, kind }
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// One name in a backend directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileType,
    /// Zero for directories.
    pub size: u64,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: FileType::File,
            size,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileType::Directory,
            size: 0,
        }
    }
}

/// Raw `statvfs` figures, in fragments of `frsize` bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatFs {
    pub blocks: u64,
    pub bfree: u64,
    /// Fragments available to unprivileged writers.
    pub bavail: u64,
    pub frsize: u64,
}

/// Capacity figures for a backend, in bytes and objects.
///
/// `None` means the backend cannot report that figure. Selection policies
/// query `free` and `objects`; the others are informational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub total: Option<i64>,
    pub used: Option<i64>,
    pub free: Option<i64>,
    pub objects: Option<i64>,
}

impl From<&StatFs> for Usage {
    fn from(st: &StatFs) -> Self {
        let bytes = |fragments: u64| {
            fragments
                .checked_mul(st.frsize)
                .and_then(|b| i64::try_from(b).ok())
        };
        Self {
            total: bytes(st.blocks),
            used: bytes(st.blocks.saturating_sub(st.bfree)),
            free: bytes(st.bavail),
            // statvfs counts inodes on the whole device, not objects below
            // the upstream root
            objects: None,
        }
    }
}
