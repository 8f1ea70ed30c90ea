//! Existing path, least free space.
//!
//! Of the upstreams holding the path, pick the one with the least free
//! space that still has more than its reserved `min_free_space`. Equal
//! free space is resolved at random. Upstreams that cannot report free
//! space rank as infinitely free.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::epall::EpAll;
use super::reduce::{least, Candidate, Metric};
use super::registry::PolicyRegistry;
use super::tiebreak::TieBreaker;
use super::Policy;
use crate::union::{Entry, UnionError, UnionResult, Upstream};

/// Existing path, least free space.
#[derive(Debug, Default)]
pub struct EpLfs {
    all: EpAll,
    tie_breaker: TieBreaker,
}

impl EpLfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `tie_breaker` to order equal candidates.
    pub fn with_tie_breaker(tie_breaker: TieBreaker) -> Self {
        Self {
            all: EpAll,
            tie_breaker,
        }
    }

    async fn lfs<C: Candidate>(&self, ctx: &CancellationToken, candidates: &[C]) -> UnionResult<C> {
        least(ctx, candidates, Metric::FreeSpace, &self.tie_breaker)
            .await?
            .ok_or(UnionError::NoSpaceAboveReserve)
    }
}

#[async_trait]
impl Policy for EpLfs {
    fn name(&self) -> &'static str {
        "eplfs"
    }

    async fn action(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        let candidates = self.all.action(ctx, upstreams, path).await?;
        Ok(vec![self.lfs(ctx, &candidates).await?])
    }

    async fn action_entries(
        &self,
        ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Vec<Entry>> {
        let candidates = self.all.action_entries(ctx, entries).await?;
        Ok(vec![self.lfs(ctx, &candidates).await?])
    }

    async fn create(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        let candidates = self.all.create(ctx, upstreams, path).await?;
        Ok(vec![self.lfs(ctx, &candidates).await?])
    }

    async fn create_entries(
        &self,
        ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Vec<Entry>> {
        let candidates = self.all.create_entries(ctx, entries).await?;
        Ok(vec![self.lfs(ctx, &candidates).await?])
    }

    async fn search(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Arc<Upstream>> {
        if upstreams.is_empty() {
            return Err(UnionError::ObjectNotFound);
        }
        let candidates = self.all.epall(ctx, upstreams, path).await?;
        self.lfs(ctx, &candidates).await
    }

    async fn search_entries(
        &self,
        ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Entry> {
        if entries.is_empty() {
            return Err(UnionError::ObjectNotFound);
        }
        self.lfs(ctx, entries).await
    }
}

/// Register [`EpLfs`] under `"eplfs"`.
pub fn register(registry: &mut PolicyRegistry) {
    registry.register(Arc::new(EpLfs::new()));
}
