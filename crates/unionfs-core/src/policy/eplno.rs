//! Existing path, least number of objects.
//!
//! Of the upstreams holding the path, pick the one storing the fewest
//! objects. Equal counts are resolved at random.
//!
//! An upstream that cannot count its objects ranks as holding none, which
//! makes it the preferred target. This matches the long-standing behaviour
//! of the policy and is kept for compatibility.

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

/// Existing path, least number of objects.
#[derive(Debug, Default)]
pub struct EpLno {
    all: EpAll,
    tie_breaker: TieBreaker,
}

impl EpLno {
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

    async fn lno<C: Candidate>(&self, ctx: &CancellationToken, candidates: &[C]) -> UnionResult<C> {
        least(ctx, candidates, Metric::NumObjects, &self.tie_breaker)
            .await?
            .ok_or(UnionError::ObjectNotFound)
    }
}

#[async_trait]
impl Policy for EpLno {
    fn name(&self) -> &'static str {
        "eplno"
    }

    async fn action(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        let candidates = self.all.action(ctx, upstreams, path).await?;
        Ok(vec![self.lno(ctx, &candidates).await?])
    }

    async fn action_entries(
        &self,
        ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Vec<Entry>> {
        let candidates = self.all.action_entries(ctx, entries).await?;
        Ok(vec![self.lno(ctx, &candidates).await?])
    }

    async fn create(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        let candidates = self.all.create(ctx, upstreams, path).await?;
        Ok(vec![self.lno(ctx, &candidates).await?])
    }

    async fn create_entries(
        &self,
        ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Vec<Entry>> {
        let candidates = self.all.create_entries(ctx, entries).await?;
        Ok(vec![self.lno(ctx, &candidates).await?])
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
        self.lno(ctx, &candidates).await
    }

    async fn search_entries(
        &self,
        ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Entry> {
        if entries.is_empty() {
            return Err(UnionError::ObjectNotFound);
        }
        self.lno(ctx, entries).await
    }
}

/// Register [`EpLno`] under `"eplno"`.
pub fn register(registry: &mut PolicyRegistry) {
    registry.register(Arc::new(EpLno::new()));
}
