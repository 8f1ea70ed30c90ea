//! Name → policy lookup.

use std::collections::HashMap;
use std::sync::Arc;

use super::tiebreak::TieBreaker;
use super::{epall, eplfs, eplno, EpLfs, EpLno, Policy};
use crate::union::{UnionError, UnionResult};

/// Registry of selection policies, keyed by name.
///
/// Built once at start-up and then shared read-only.
#[derive(Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Arc<dyn Policy>>,
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("policies", &self.names())
            .finish()
    }
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `epall`, `eplno` and `eplfs`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        epall::register(&mut registry);
        eplno::register(&mut registry);
        eplfs::register(&mut registry);
        registry
    }

    /// Like [`with_builtin`](Self::with_builtin), with tie-breakers seeded
    /// from `seed` so selections are reproducible.
    pub fn with_builtin_seeded(seed: u64) -> Self {
        let mut registry = Self::new();
        epall::register(&mut registry);
        registry.register(Arc::new(EpLno::with_tie_breaker(TieBreaker::seeded(seed))));
        registry.register(Arc::new(EpLfs::with_tie_breaker(TieBreaker::seeded(seed))));
        registry
    }

    /// Register a policy under its own name, replacing any previous one.
    pub fn register(&mut self, policy: Arc<dyn Policy>) -> Option<Arc<dyn Policy>> {
        let name = policy.name().to_string();
        tracing::debug!(policy = %name, "registered policy");
        self.policies.insert(name, policy)
    }

    /// Look up a policy. Names are case-insensitive.
    pub fn get(&self, name: &str) -> UnionResult<Arc<dyn Policy>> {
        self.policies
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| UnionError::UnknownPolicy(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
