//! Existing path, all.
//!
//! Keeps every upstream on which the path exists. The tie-break policies
//! run this stage first and reduce its output.

use async_trait::async_trait;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::registry::PolicyRegistry;
use super::Policy;
use crate::union::{Entry, UnionError, UnionResult, Upstream};

/// Upstreams on which `path` resolves to a file or directory.
///
/// Existence checks run concurrently; the result keeps input order. An
/// empty result is not an error here. Backend failures other than
/// absence, and cancellation, abort the whole filter.
pub async fn filter_existing(
    ctx: &CancellationToken,
    upstreams: &[Arc<Upstream>],
    path: &Path,
) -> UnionResult<Vec<Arc<Upstream>>> {
    let checks = join_all(upstreams.iter().map(|u| u.exists(ctx, path))).await;

    let mut found = Vec::with_capacity(upstreams.len());
    for (upstream, exists) in upstreams.iter().zip(checks) {
        if exists? {
            found.push(Arc::clone(upstream));
        }
    }
    tracing::trace!(path = %path.display(), found = found.len(), "existing-path filter");
    Ok(found)
}

/// Entry-set counterpart of [`filter_existing`].
///
/// Listed entries exist by construction, so every entry is kept.
pub fn filter_existing_entries(entries: &[Entry]) -> Vec<Entry> {
    entries.to_vec()
}

fn require_nonempty<T>(items: Vec<T>, err: fn() -> UnionError) -> UnionResult<Vec<T>> {
    if items.is_empty() { Err(err()) } else { Ok(items) }
}

/// Existing path, all.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpAll;

impl EpAll {
    pub fn new() -> Self {
        Self
    }

    /// Filter `upstreams`, turning an empty result into not-found.
    pub(crate) async fn epall(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        let found = filter_existing(ctx, upstreams, path).await?;
        require_nonempty(found, || UnionError::ObjectNotFound)
    }

    /// Shared Action/Create handle pipeline: writability gate then filter.
    async fn writable(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
        allowed: fn(&Upstream) -> bool,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        if upstreams.is_empty() {
            return Err(UnionError::ObjectNotFound);
        }
        let gated: Vec<_> = upstreams.iter().filter(|u| allowed(u)).cloned().collect();
        let gated = require_nonempty(gated, || UnionError::PermissionDenied)?;
        self.epall(ctx, &gated, path).await
    }

    /// Shared Action/Create entry pipeline.
    fn writable_entries(
        &self,
        entries: &[Entry],
        allowed: fn(&Upstream) -> bool,
    ) -> UnionResult<Vec<Entry>> {
        if entries.is_empty() {
            return Err(UnionError::ObjectNotFound);
        }
        let gated: Vec<_> = filter_existing_entries(entries)
            .into_iter()
            .filter(|e| allowed(e.upstream()))
            .collect();
        require_nonempty(gated, || UnionError::PermissionDenied)
    }
}

#[async_trait]
impl Policy for EpAll {
    fn name(&self) -> &'static str {
        "epall"
    }

    async fn action(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        self.writable(ctx, upstreams, path, Upstream::is_writable).await
    }

    async fn action_entries(
        &self,
        _ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Vec<Entry>> {
        self.writable_entries(entries, Upstream::is_writable)
    }

    async fn create(
        &self,
        ctx: &CancellationToken,
        upstreams: &[Arc<Upstream>],
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        self.writable(ctx, upstreams, path, Upstream::can_create).await
    }

    async fn create_entries(
        &self,
        _ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Vec<Entry>> {
        self.writable_entries(entries, Upstream::can_create)
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
        let found = self.epall(ctx, upstreams, path).await?;
        found.into_iter().next().ok_or(UnionError::ObjectNotFound)
    }

    async fn search_entries(
        &self,
        _ctx: &CancellationToken,
        entries: &[Entry],
    ) -> UnionResult<Entry> {
        filter_existing_entries(entries)
            .into_iter()
            .next()
            .ok_or(UnionError::ObjectNotFound)
    }
}

/// Register [`EpAll`] under `"epall"`.
pub fn register(registry: &mut PolicyRegistry) {
    registry.register(Arc::new(EpAll));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::union::UpstreamMode;
    use crate::vfs::{DirEntry, MemoryBackend, VfsOps};

    async fn upstream_with(name: &str, files: &[&str], mode: UpstreamMode) -> Arc<Upstream> {
        let backend = MemoryBackend::new();
        for f in files {
            backend.create(Path::new(f), 0o644).await.unwrap();
        }
        Arc::new(Upstream::new(name, backend).with_mode(mode))
    }

    fn names(ups: &[Arc<Upstream>]) -> Vec<&str> {
        ups.iter().map(|u| u.name()).collect()
    }

    #[tokio::test]
    async fn test_filter_keeps_order() {
        let ctx = CancellationToken::new();
        let ups = vec![
            upstream_with("a", &["x/f"], UpstreamMode::ReadWrite).await,
            upstream_with("b", &[], UpstreamMode::ReadWrite).await,
            upstream_with("c", &["x/g"], UpstreamMode::ReadWrite).await,
        ];

        let found = filter_existing(&ctx, &ups, Path::new("/x")).await.unwrap();
        assert_eq!(names(&found), vec!["a", "c"]);

        let none = filter_existing(&ctx, &ups, Path::new("/nope")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_filter_is_idempotent() {
        let ctx = CancellationToken::new();
        let ups = vec![
            upstream_with("a", &["f"], UpstreamMode::ReadWrite).await,
            upstream_with("b", &[], UpstreamMode::ReadWrite).await,
            upstream_with("c", &["f"], UpstreamMode::ReadWrite).await,
        ];

        let once = filter_existing(&ctx, &ups, Path::new("f")).await.unwrap();
        let twice = filter_existing(&ctx, &once, Path::new("f")).await.unwrap();
        assert_eq!(names(&once), names(&twice));
    }

    #[tokio::test]
    async fn test_filter_propagates_outage() {
        let ctx = CancellationToken::new();
        let backend = Arc::new(MemoryBackend::new());
        backend.set_offline(true);
        let ups = vec![
            upstream_with("a", &["f"], UpstreamMode::ReadWrite).await,
            Arc::new(Upstream::from_arc("down", backend)),
        ];

        let err = filter_existing(&ctx, &ups, Path::new("f")).await.unwrap_err();
        assert!(matches!(err, UnionError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_action_returns_all_writable() {
        let ctx = CancellationToken::new();
        let ups = vec![
            upstream_with("a", &["f"], UpstreamMode::ReadWrite).await,
            upstream_with("ro", &["f"], UpstreamMode::ReadOnly).await,
            upstream_with("nc", &["f"], UpstreamMode::NoCreate).await,
        ];

        let out = EpAll.action(&ctx, &ups, Path::new("f")).await.unwrap();
        assert_eq!(names(&out), vec!["a", "nc"]);

        let out = EpAll.create(&ctx, &ups, Path::new("f")).await.unwrap();
        assert_eq!(names(&out), vec!["a"]);
    }

    #[tokio::test]
    async fn test_error_classes() {
        let ctx = CancellationToken::new();
        let empty: Vec<Arc<Upstream>> = Vec::new();
        assert!(matches!(
            EpAll.action(&ctx, &empty, Path::new("f")).await,
            Err(UnionError::ObjectNotFound)
        ));

        let ro = vec![upstream_with("ro", &["f"], UpstreamMode::ReadOnly).await];
        assert!(matches!(
            EpAll.create(&ctx, &ro, Path::new("f")).await,
            Err(UnionError::PermissionDenied)
        ));

        let rw = vec![upstream_with("rw", &[], UpstreamMode::ReadWrite).await];
        assert!(matches!(
            EpAll.action(&ctx, &rw, Path::new("f")).await,
            Err(UnionError::ObjectNotFound)
        ));
        assert!(matches!(
            EpAll.search(&ctx, &rw, Path::new("f")).await,
            Err(UnionError::ObjectNotFound)
        ));
    }

    #[tokio::test]
    async fn test_search_returns_first() {
        let ctx = CancellationToken::new();
        let ups = vec![
            upstream_with("a", &[], UpstreamMode::ReadWrite).await,
            upstream_with("b", &["f"], UpstreamMode::ReadOnly).await,
            upstream_with("c", &["f"], UpstreamMode::ReadWrite).await,
        ];
        let out = EpAll.search(&ctx, &ups, Path::new("f")).await.unwrap();
        assert_eq!(out.name(), "b");
    }

    #[tokio::test]
    async fn test_entry_variants() {
        let ctx = CancellationToken::new();
        let rw = upstream_with("rw", &[], UpstreamMode::ReadWrite).await;
        let ro = upstream_with("ro", &[], UpstreamMode::ReadOnly).await;
        let entries = vec![
            Entry::new(DirEntry::file("f", 1), ro),
            Entry::new(DirEntry::file("f", 2), rw),
        ];

        let out = EpAll.action_entries(&ctx, &entries).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].upstream().name(), "rw");

        let first = EpAll.search_entries(&ctx, &entries).await.unwrap();
        assert_eq!(first.upstream().name(), "ro");

        assert!(matches!(
            EpAll.search_entries(&ctx, &[]).await,
            Err(UnionError::ObjectNotFound)
        ));
        assert!(matches!(
            EpAll.create_entries(&ctx, &entries[..1]).await,
            Err(UnionError::PermissionDenied)
        ));
    }

    #[test]
    fn test_entry_filter_passes_through() {
        let up = Arc::new(Upstream::new("a", MemoryBackend::new()));
        let entries = vec![
            Entry::new(DirEntry::file("x", 0), up.clone()),
            Entry::new(DirEntry::directory("y"), up),
        ];
        let once = filter_existing_entries(&entries);
        let twice = filter_existing_entries(&once);
        assert_eq!(twice.len(), 2);
        assert_eq!(twice[1].name(), "y");
    }
}
