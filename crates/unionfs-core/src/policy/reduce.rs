//! Least-metric reduction shared by the tie-break policies.

use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::tiebreak::TieBreaker;
use crate::union::{Entry, UnionError, UnionResult, Upstream};

/// Anything a policy can select: an upstream or a listed entry.
pub trait Candidate: Clone + Send + Sync {
    /// The upstream whose metrics rank this candidate.
    fn upstream(&self) -> &Arc<Upstream>;
}

impl Candidate for Arc<Upstream> {
    fn upstream(&self) -> &Arc<Upstream> {
        self
    }
}

impl Candidate for Entry {
    fn upstream(&self) -> &Arc<Upstream> {
        Entry::upstream(self)
    }
}

/// Numeric figure a reduction minimises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Objects stored on the upstream.
    NumObjects,
    /// Free bytes on the upstream, above its reserved threshold.
    FreeSpace,
}

impl Metric {
    /// Name used in log fields.
    fn label(self) -> &'static str {
        match self {
            Metric::NumObjects => "number of objects",
            Metric::FreeSpace => "free space",
        }
    }

    /// Value used when an upstream cannot report the metric.
    ///
    /// An unknown object count ranks as empty, so such upstreams are
    /// preferred. Unknown free space ranks as infinite and only wins when
    /// nothing else is eligible.
    pub fn fallback(self) -> i64 {
        match self {
            Metric::NumObjects => 0,
            Metric::FreeSpace => i64::MAX,
        }
    }

    async fn query(self, ctx: &CancellationToken, upstream: &Upstream) -> UnionResult<i64> {
        match self {
            Metric::NumObjects => upstream.num_objects(ctx).await,
            Metric::FreeSpace => upstream.free_space(ctx).await,
        }
    }

    fn eligible(self, value: i64, upstream: &Upstream) -> bool {
        match self {
            Metric::NumObjects => true,
            Metric::FreeSpace => value > upstream.min_free_space(),
        }
    }
}

/// Pick the eligible candidate with the smallest `metric`.
///
/// Candidates are shuffled (on a private copy) and scanned keeping the
/// first strict minimum, so ties resolve uniformly at random. Metric
/// queries run concurrently; a failed query is logged and replaced by
/// [`Metric::fallback`]. Cancellation aborts the reduction.
///
/// Returns `None` when no candidate is eligible.
pub async fn least<C: Candidate>(
    ctx: &CancellationToken,
    candidates: &[C],
    metric: Metric,
    tie_breaker: &TieBreaker,
) -> UnionResult<Option<C>> {
    let shuffled = tie_breaker.shuffled(candidates);
    let values = join_all(shuffled.iter().map(|c| metric.query(ctx, c.upstream()))).await;

    let mut best: Option<(i64, C)> = None;
    for (candidate, value) in shuffled.into_iter().zip(values) {
        let upstream = candidate.upstream();
        let value = match value {
            Ok(v) => v,
            Err(UnionError::Cancelled) => return Err(UnionError::Cancelled),
            Err(e) => {
                tracing::warn!(
                    upstream = %upstream.name(),
                    metric = metric.label(),
                    error = %e,
                    fallback = metric.fallback(),
                    "metric unavailable, using fallback"
                );
                metric.fallback()
            }
        };

        if !metric.eligible(value, upstream) {
            tracing::debug!(
                upstream = %upstream.name(),
                value,
                min_free_space = upstream.min_free_space(),
                "skipping upstream at or below reserved space"
            );
            continue;
        }

        if best.as_ref().is_none_or(|(current, _)| value < *current) {
            best = Some((value, candidate));
        }
    }

    if let Some((value, winner)) = &best {
        tracing::debug!(
            upstream = %winner.upstream().name(),
            metric = metric.label(),
            value = *value,
            "selected"
        );
    }
    Ok(best.map(|(_, winner)| winner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryBackend;

    fn lfs(name: &str, free: i64, min: i64) -> Arc<Upstream> {
        Arc::new(
            Upstream::new(name, MemoryBackend::new().with_free_space(free)).with_min_free_space(min),
        )
    }

    fn names<C: Candidate>(items: &[C]) -> Vec<String> {
        items.iter().map(|c| c.upstream().name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_input() {
        let ctx = CancellationToken::new();
        let none: Vec<Arc<Upstream>> = Vec::new();
        let out = least(&ctx, &none, Metric::NumObjects, &TieBreaker::default()).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_input_not_mutated() {
        let ctx = CancellationToken::new();
        let input: Vec<_> = (0..8).map(|i| lfs(&format!("u{i}"), 100, 0)).collect();
        let before = names(&input);
        for _ in 0..10 {
            least(&ctx, &input, Metric::FreeSpace, &TieBreaker::default()).await.unwrap();
        }
        assert_eq!(names(&input), before);
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let ctx = CancellationToken::new();
        let input = vec![lfs("at", 10, 10), lfs("above", 11, 10)];
        let out = least(&ctx, &input, Metric::FreeSpace, &TieBreaker::default()).await.unwrap();
        assert_eq!(out.unwrap().name(), "above");
    }

    #[tokio::test]
    async fn test_unknown_free_space_only_wins_alone() {
        let ctx = CancellationToken::new();
        let unknown = Arc::new(Upstream::new("unknown", MemoryBackend::new().without_free_space()));

        let alone = vec![unknown.clone()];
        let out = least(&ctx, &alone, Metric::FreeSpace, &TieBreaker::default()).await.unwrap();
        assert_eq!(out.unwrap().name(), "unknown");

        let mixed = vec![unknown, lfs("known", 1 << 40, 0)];
        for _ in 0..20 {
            let out = least(&ctx, &mixed, Metric::FreeSpace, &TieBreaker::default()).await.unwrap();
            assert_eq!(out.unwrap().name(), "known");
        }
    }

    #[tokio::test]
    async fn test_cancellation_aborts() {
        let ctx = CancellationToken::new();
        ctx.cancel();
        let input = vec![lfs("a", 100, 0)];
        let out = least(&ctx, &input, Metric::FreeSpace, &TieBreaker::default()).await;
        assert!(matches!(out, Err(UnionError::Cancelled)));
    }

    #[tokio::test]
    async fn test_seeded_ties_are_reproducible() {
        let ctx = CancellationToken::new();
        let input: Vec<_> = (0..6).map(|i| lfs(&format!("u{i}"), 100, 0)).collect();

        let a = TieBreaker::seeded(42);
        let b = TieBreaker::seeded(42);
        for _ in 0..5 {
            let x = least(&ctx, &input, Metric::FreeSpace, &a).await.unwrap().unwrap();
            let y = least(&ctx, &input, Metric::FreeSpace, &b).await.unwrap().unwrap();
            assert_eq!(x.name(), y.name());
        }
    }
}
