//! Listed objects annotated with the upstream that produced them.

use std::sync::Arc;

use super::upstream::Upstream;
use crate::vfs::{DirEntry, FileType};

/// A file or directory found by listing one upstream.
#[derive(Debug, Clone)]
pub struct Entry {
    name: String,
    kind: FileType,
    size: u64,
    upstream: Arc<Upstream>,
}

impl Entry {
    /// Annotate a backend listing entry with its upstream.
    pub fn new(entry: DirEntry, upstream: Arc<Upstream>) -> Self {
        Self {
            name: entry.name,
            kind: entry.kind,
            size: entry.size,
            upstream,
        }
    }

    /// Entry name (not full path).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry type.
    pub fn kind(&self) -> FileType {
        self.kind
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The upstream this entry was listed from.
    pub fn upstream(&self) -> &Arc<Upstream> {
        &self.upstream
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}
