//! Upstream handles.
//!
//! An [`Upstream`] wraps one backend together with the settings the union
//! applies to it: a writability mode, a reserved free-space threshold and
//! a usage cache. Policies only ever read from upstreams.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;

use super::error::{UnionError, UnionResult};
use crate::vfs::{DirEntry, Usage, VfsOps};

/// Which operation categories an upstream accepts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum UpstreamMode {
    /// Reads, modifications and creation.
    #[default]
    #[serde(rename = "rw")]
    #[strum(serialize = "rw")]
    ReadWrite,
    /// Reads only; excluded from Action and Create.
    #[serde(rename = "ro")]
    #[strum(serialize = "ro")]
    ReadOnly,
    /// Existing objects may be modified, new ones are never created here.
    #[serde(rename = "nc")]
    #[strum(serialize = "nc")]
    NoCreate,
}

#[derive(Debug, Clone, Copy)]
struct CachedUsage {
    fetched: Instant,
    usage: Usage,
}

/// Run `fut` unless `ctx` is cancelled first.
pub(crate) async fn cancellable<F, T>(ctx: &CancellationToken, fut: F) -> UnionResult<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(UnionError::Cancelled),
        out = fut => Ok(out),
    }
}

/// One backend participating in the union.
pub struct Upstream {
    name: String,
    root: PathBuf,
    backend: Arc<dyn VfsOps>,
    mode: UpstreamMode,
    min_free_space: i64,
    cache_time: Duration,
    usage: Mutex<Option<CachedUsage>>,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("mode", &self.mode)
            .field("min_free_space", &self.min_free_space)
            .field("cache_time", &self.cache_time)
            .finish()
    }
}

impl Upstream {
    /// Create a read-write upstream with no reserved space and no usage cache.
    pub fn new(name: impl Into<String>, backend: impl VfsOps + 'static) -> Self {
        Self::from_arc(name, Arc::new(backend))
    }

    /// Create an upstream from a backend already wrapped in `Arc`.
    pub fn from_arc(name: impl Into<String>, backend: Arc<dyn VfsOps>) -> Self {
        Self {
            name: name.into(),
            root: PathBuf::new(),
            backend,
            mode: UpstreamMode::ReadWrite,
            min_free_space: 0,
            cache_time: Duration::ZERO,
            usage: Mutex::new(None),
        }
    }

    /// Serve union paths from `root` inside the backend.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the writability mode.
    pub fn with_mode(mut self, mode: UpstreamMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the reserved free-space threshold in bytes.
    pub fn with_min_free_space(mut self, bytes: i64) -> Self {
        self.min_free_space = bytes;
        self
    }

    /// Reuse fetched usage figures for `ttl`. Zero disables caching.
    pub fn with_cache_time(mut self, ttl: Duration) -> Self {
        self.cache_time = ttl;
        self
    }

    /// Upstream name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root inside the backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writability mode.
    pub fn mode(&self) -> UpstreamMode {
        self.mode
    }

    /// Reserved free-space threshold in bytes.
    pub fn min_free_space(&self) -> i64 {
        self.min_free_space
    }

    /// True when existing objects may be modified here.
    pub fn is_writable(&self) -> bool {
        self.mode != UpstreamMode::ReadOnly && !self.backend.read_only()
    }

    /// True when new objects may be created here.
    pub fn can_create(&self) -> bool {
        self.mode == UpstreamMode::ReadWrite && !self.backend.read_only()
    }

    /// Translate a union path into a backend path.
    pub fn backend_path(&self, path: &Path) -> PathBuf {
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.root.join(relative)
    }

    /// Host location of a union path, when the backend maps onto the host.
    pub fn host_path(&self, path: &Path) -> Option<PathBuf> {
        self.backend.host_path(&self.backend_path(path))
    }

    /// Whether `path` resolves to a file or directory on this upstream.
    pub async fn exists(&self, ctx: &CancellationToken, path: &Path) -> UnionResult<bool> {
        let target = self.backend_path(path);
        cancellable(ctx, self.backend.exists(&target))
            .await?
            .map_err(|e| UnionError::upstream(&self.name, e))
    }

    /// List a directory on this upstream.
    pub async fn readdir(&self, ctx: &CancellationToken, path: &Path) -> UnionResult<Vec<DirEntry>> {
        let target = self.backend_path(path);
        cancellable(ctx, self.backend.readdir(&target))
            .await?
            .map_err(|e| UnionError::upstream(&self.name, e))
    }

    /// Capacity figures, served from the cache while fresh.
    pub async fn usage(&self, ctx: &CancellationToken) -> UnionResult<Usage> {
        cancellable(ctx, self.fetch_usage()).await?
    }

    async fn fetch_usage(&self) -> UnionResult<Usage> {
        if !self.cache_time.is_zero() {
            if let Some(cached) = *self.usage.lock() {
                if cached.fetched.elapsed() < self.cache_time {
                    return Ok(cached.usage);
                }
            }
        }

        let usage = self
            .backend
            .usage()
            .await
            .map_err(|e| UnionError::upstream(&self.name, e))?;

        tracing::trace!(upstream = %self.name, ?usage, "refreshed usage");
        *self.usage.lock() = Some(CachedUsage {
            fetched: Instant::now(),
            usage,
        });
        Ok(usage)
    }

    /// Drop cached usage so the next query hits the backend.
    pub fn invalidate_usage(&self) {
        *self.usage.lock() = None;
    }

    /// Free space in bytes.
    pub async fn free_space(&self, ctx: &CancellationToken) -> UnionResult<i64> {
        self.usage(ctx)
            .await?
            .free
            .ok_or_else(|| UnionError::MetricUnsupported {
                upstream: self.name.clone(),
                metric: "free space",
            })
    }

    /// Number of objects stored.
    pub async fn num_objects(&self, ctx: &CancellationToken) -> UnionResult<i64> {
        self.usage(ctx)
            .await?
            .objects
            .ok_or_else(|| UnionError::MetricUnsupported {
                upstream: self.name.clone(),
                metric: "number of objects",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{LocalBackend, MemoryBackend};

    #[tokio::test]
    async fn test_metrics() {
        let up = Upstream::new(
            "a",
            MemoryBackend::new().with_free_space(100).with_object_count(7),
        );
        let ctx = CancellationToken::new();
        assert_eq!(up.free_space(&ctx).await.unwrap(), 100);
        assert_eq!(up.num_objects(&ctx).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_unsupported_metric() {
        let up = Upstream::new("a", MemoryBackend::new().without_free_space());
        let ctx = CancellationToken::new();
        let err = up.free_space(&ctx).await.unwrap_err();
        assert!(matches!(err, UnionError::MetricUnsupported { metric: "free space", .. }));
    }

    #[tokio::test]
    async fn test_usage_cache() {
        let backend = Arc::new(MemoryBackend::new().with_capacity(100));
        let up = Upstream::from_arc("a", backend.clone()).with_cache_time(Duration::from_secs(60));
        let ctx = CancellationToken::new();

        assert_eq!(up.num_objects(&ctx).await.unwrap(), 0);
        backend.create(Path::new("f"), 0o644).await.unwrap();
        // Still served from the cache
        assert_eq!(up.num_objects(&ctx).await.unwrap(), 0);

        up.invalidate_usage();
        assert_eq!(up.num_objects(&ctx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_cache_by_default() {
        let backend = Arc::new(MemoryBackend::new());
        let up = Upstream::from_arc("a", backend.clone());
        let ctx = CancellationToken::new();

        assert_eq!(up.num_objects(&ctx).await.unwrap(), 0);
        backend.create(Path::new("f"), 0o644).await.unwrap();
        assert_eq!(up.num_objects(&ctx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_query() {
        let up = Upstream::new("a", MemoryBackend::new());
        let ctx = CancellationToken::new();
        ctx.cancel();
        assert!(matches!(up.free_space(&ctx).await, Err(UnionError::Cancelled)));
        assert!(matches!(
            up.exists(&ctx, Path::new("/")).await,
            Err(UnionError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_root_and_exists() {
        let backend = Arc::new(MemoryBackend::new());
        backend.create(Path::new("share/media/a.mkv"), 0o644).await.unwrap();
        let up = Upstream::from_arc("a", backend).with_root("share");
        let ctx = CancellationToken::new();

        assert_eq!(up.backend_path(Path::new("/media")), PathBuf::from("share/media"));
        assert!(up.exists(&ctx, Path::new("/media/a.mkv")).await.unwrap());
        assert!(!up.exists(&ctx, Path::new("/a.mkv")).await.unwrap());
    }

    #[test]
    fn test_host_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let host_root = dunce::canonicalize(dir.path()).unwrap();
        let local = Upstream::new("a", LocalBackend::new(dir.path())).with_root("share");
        assert_eq!(
            local.host_path(Path::new("/media/x.mkv")),
            Some(host_root.join("share/media/x.mkv"))
        );

        let memory = Upstream::new("b", MemoryBackend::new());
        assert_eq!(memory.host_path(Path::new("/media/x.mkv")), None);
    }

    #[tokio::test]
    async fn test_outage_is_a_hard_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_offline(true);
        let up = Upstream::from_arc("down", backend);
        let ctx = CancellationToken::new();

        let err = up.exists(&ctx, Path::new("/x")).await.unwrap_err();
        assert!(matches!(err, UnionError::Upstream { ref upstream, .. } if upstream == "down"));
    }

    #[test]
    fn test_modes() {
        assert_eq!("nc".parse::<UpstreamMode>().unwrap(), UpstreamMode::NoCreate);
        assert_eq!(UpstreamMode::ReadOnly.to_string(), "ro");

        let ro = Upstream::new("a", MemoryBackend::new()).with_mode(UpstreamMode::ReadOnly);
        assert!(!ro.is_writable());
        assert!(!ro.can_create());

        let nc = Upstream::new("b", MemoryBackend::new()).with_mode(UpstreamMode::NoCreate);
        assert!(nc.is_writable());
        assert!(!nc.can_create());

        let backend_ro = Upstream::new("c", MemoryBackend::new().with_read_only());
        assert!(!backend_ro.is_writable());
    }
}
