//! Storage backend abstraction.
//!
//! Each upstream of a union is a backend driven through [`VfsOps`].
//!
//! - [`VfsOps`] - Core trait for backend operations
//! - [`MemoryBackend`] - In-memory backend (testing, scratch space)
//! - [`LocalBackend`] - A host directory (with path security)
//!
//! Backends report capacity through [`Usage`]. Figures a backend cannot
//! produce are `None`; selection policies decide what that means.

pub mod backends;
mod error;
mod ops;
mod types;

pub use backends::{LocalBackend, MemoryBackend};
pub use error::{VfsError, VfsResult};
pub use ops::VfsOps;
pub use types::{DirEntry, FileAttr, FileType, StatFs, Usage};
