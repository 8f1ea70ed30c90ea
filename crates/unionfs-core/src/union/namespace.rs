//! The union namespace: upstreams plus one policy per category.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::config::UnionConfig;
use super::entry::Entry;
use super::error::{UnionError, UnionResult};
use super::upstream::Upstream;
use crate::policy::{filter_existing, Category, Policy, PolicyRegistry};
use crate::vfs::LocalBackend;

/// Several upstreams presented as one namespace.
///
/// Every request is routed through the policy configured for its
/// category. The union only decides; callers perform the I/O on the
/// upstreams it returns.
pub struct Union {
    upstreams: Vec<Arc<Upstream>>,
    action: Arc<dyn Policy>,
    create: Arc<dyn Policy>,
    search: Arc<dyn Policy>,
}

impl std::fmt::Debug for Union {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Union")
            .field(
                "upstreams",
                &self.upstreams.iter().map(|u| u.name()).collect::<Vec<_>>(),
            )
            .field("action", &self.action.name())
            .field("create", &self.create.name())
            .field("search", &self.search.name())
            .finish()
    }
}

/// Parent directory of a union path (`/` for top-level names).
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("/"),
    }
}

impl Union {
    pub fn new(
        upstreams: Vec<Arc<Upstream>>,
        action: Arc<dyn Policy>,
        create: Arc<dyn Policy>,
        search: Arc<dyn Policy>,
    ) -> Self {
        Self {
            upstreams,
            action,
            create,
            search,
        }
    }

    /// Build a union of local directories from configuration.
    pub fn from_config(config: &UnionConfig, registry: &PolicyRegistry) -> UnionResult<Self> {
        config.validate()?;

        let upstreams = config
            .upstreams
            .iter()
            .map(|uc| {
                let root = uc.expanded_root();
                if !root.is_dir() {
                    return Err(UnionError::config(format!(
                        "upstream {}: {} is not a directory",
                        uc.name,
                        root.display()
                    )));
                }
                let upstream = Upstream::new(uc.name.clone(), LocalBackend::new(root))
                    .with_mode(uc.mode)
                    .with_min_free_space(config.min_free_space_for(uc))
                    .with_cache_time(config.cache_time());
                Ok(Arc::new(upstream))
            })
            .collect::<UnionResult<Vec<_>>>()?;

        let union = Self::new(
            upstreams,
            registry.get(&config.action_policy)?,
            registry.get(&config.create_policy)?,
            registry.get(&config.search_policy)?,
        );
        tracing::info!(?union, "union configured");
        Ok(union)
    }

    /// Participating upstreams, in configuration order.
    pub fn upstreams(&self) -> &[Arc<Upstream>] {
        &self.upstreams
    }

    /// Policy configured for `category`.
    pub fn policy(&self, category: Category) -> &Arc<dyn Policy> {
        match category {
            Category::Action => &self.action,
            Category::Create => &self.create,
            Category::Search => &self.search,
        }
    }

    /// Upstreams on which to modify the object at `path`.
    pub async fn action_upstreams(
        &self,
        ctx: &CancellationToken,
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        self.action.action(ctx, &self.upstreams, path).await
    }

    /// Upstreams on which to create `path`.
    ///
    /// Candidates are the upstreams holding the parent directory.
    pub async fn create_upstreams(
        &self,
        ctx: &CancellationToken,
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        let parent = parent_dir(path);
        self.create.create(ctx, &self.upstreams, &parent).await
    }

    /// The upstream to read `path` from.
    pub async fn search_upstream(
        &self,
        ctx: &CancellationToken,
        path: &Path,
    ) -> UnionResult<Arc<Upstream>> {
        self.search.search(ctx, &self.upstreams, path).await
    }

    /// Dispatch by category.
    pub async fn select(
        &self,
        ctx: &CancellationToken,
        category: Category,
        path: &Path,
    ) -> UnionResult<Vec<Arc<Upstream>>> {
        match category {
            Category::Action => self.action_upstreams(ctx, path).await,
            Category::Create => self.create_upstreams(ctx, path).await,
            Category::Search => Ok(vec![self.search_upstream(ctx, path).await?]),
        }
    }

    /// Merged listing of the directory at `path`.
    ///
    /// Names present on several upstreams are resolved with the search
    /// policy, so each name appears once.
    pub async fn readdir(&self, ctx: &CancellationToken, path: &Path) -> UnionResult<Vec<Entry>> {
        let holders = filter_existing(ctx, &self.upstreams, path).await?;
        if holders.is_empty() {
            return Err(UnionError::ObjectNotFound);
        }

        let listings = join_all(holders.iter().map(|u| u.readdir(ctx, path))).await;

        let mut by_name: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
        for (upstream, listing) in holders.iter().zip(listings) {
            for dir_entry in listing? {
                let entry = Entry::new(dir_entry, Arc::clone(upstream));
                by_name.entry(entry.name().to_string()).or_default().push(entry);
            }
        }

        let mut merged = Vec::with_capacity(by_name.len());
        for (name, mut group) in by_name {
            if group.len() == 1 {
                merged.extend(group.pop());
            } else {
                tracing::trace!(%name, copies = group.len(), "resolving duplicate entry");
                merged.push(self.search.search_entries(ctx, &group).await?);
            }
        }
        Ok(merged)
    }
}
