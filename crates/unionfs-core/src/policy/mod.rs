//! Upstream selection policies.
//!
//! A policy decides which upstream(s) of a union carry out an operation.
//! Operations fall into three categories:
//!
//! - **Action**: modify an existing object (delete, rename, setattr)
//! - **Create**: produce a new file or directory
//! - **Search**: read-only lookup
//!
//! Each category comes in two shapes: over upstream handles plus a path
//! (the policy checks existence itself) or over entries that a listing
//! already produced.
//!
//! Policies:
//!
//! - [`EpAll`] - existing path, all: every upstream holding the path
//! - [`EpLno`] - existing path, least number of objects
//! - [`EpLfs`] - existing path, least free space above the reserved margin
//!
//! Policies are looked up by name through a [`PolicyRegistry`].

mod epall;
mod eplfs;
mod eplno;
mod reduce;
mod registry;
mod tiebreak;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;

use crate::union::{Entry, UnionResult, Upstream};

pub use epall::{filter_existing, filter_existing_entries, EpAll};
pub use eplfs::EpLfs;
pub use eplno::EpLno;
pub use reduce::{least, Candidate, Metric};
pub use registry::PolicyRegistry;
pub use tiebreak::TieBreaker;

/// Operation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Category {
    /// Modification of existing objects.
    Action,
    /// Creation of new objects.
    Create,
    /// Read-only lookup.
    Search,
}

/// An upstream selection policy.
///
/// Every method takes a cancellation token; cancelling it makes the call
/// return [`UnionError::Cancelled`](crate::union::UnionError::Cancelled).
#[async_trait]
pub trait Policy: Send + Sync {
    /// Registry name, e.g. `"eplfs"`.
    fn name(&self) -> &'static str;

    /// Upstreams on which to modify the object at `path`.
    async fn action(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>>;

    /// Entries to modify, chosen from a listing.
    async fn action_entries(
        &self,
        ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Vec<Entry>>;

    /// Upstreams on which `path` exists and new objects may be created.
    ///
    /// Callers creating a new object pass its parent directory.
    async fn create(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>>;

    /// Entries to create against, chosen from a listing.
    async fn create_entries(
        &self,
        ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Vec<Entry>>;

    /// The upstream to read `path` from.
    async fn search(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Arc<Upstream>>;

    /// The entry to read, chosen from a listing.
    async fn search_entries(&self, ctx: &CancellationToken, entries: &[Entry])
    -> UnionResult<Entry>;
}
