//! # unionfs-core
//!
//! Upstream selection for a union filesystem.
//!
//! A union presents several storage backends ("upstreams") as one
//! namespace. For every request it must decide which upstream(s) carry it
//! out. This crate makes that decision; it never moves data itself.
//!
//! - [`vfs`] - backend trait and the memory/local backends
//! - [`union`] - upstream handles, entries, configuration, the [`Union`]
//! - [`policy`] - selection policies and the [`PolicyRegistry`]

pub mod policy;
pub mod union;
pub mod vfs;

pub use policy::{Category, EpAll, EpLfs, EpLno, Policy, PolicyRegistry, TieBreaker};
pub use union::{Entry, Union, UnionConfig, UnionError, UnionResult, Upstream, UpstreamMode};
pub use vfs::{
    backends::{LocalBackend, MemoryBackend},
    DirEntry, FileAttr, FileType, StatFs, Usage, VfsError, VfsOps, VfsResult,
};
