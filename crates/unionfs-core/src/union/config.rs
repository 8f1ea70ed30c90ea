//! Union configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! action_policy = "epall"
//! create_policy = "eplfs"
//! search_policy = "epall"
//! cache_time_secs = 120
//! min_free_space = 1073741824
//!
//! [[upstreams]]
//! name = "disk1"
//! root = "/mnt/disk1"
//!
//! [[upstreams]]
//! name = "archive"
//! root = "~/archive"
//! mode = "ro"
//! min_free_space = 0
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{UnionError, UnionResult};
use super::upstream::UpstreamMode;
use crate::policy::PolicyRegistry;

/// Default reserved free space per upstream (1 GiB).
pub const DEFAULT_MIN_FREE_SPACE: i64 = 1 << 30;

/// Default lifetime of cached usage figures.
pub const DEFAULT_CACHE_TIME_SECS: u64 = 120;

fn default_action_policy() -> String {
    "epall".to_string()
}

fn default_create_policy() -> String {
    "eplfs".to_string()
}

fn default_search_policy() -> String {
    "epall".to_string()
}

fn default_cache_time() -> u64 {
    DEFAULT_CACHE_TIME_SECS
}

fn default_min_free_space() -> i64 {
    DEFAULT_MIN_FREE_SPACE
}

/// Top-level union configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnionConfig {
    /// Policy for modifying existing objects.
    #[serde(default = "default_action_policy")]
    pub action_policy: String,

    /// Policy for creating objects.
    #[serde(default = "default_create_policy")]
    pub create_policy: String,

    /// Policy for lookups.
    #[serde(default = "default_search_policy")]
    pub search_policy: String,

    /// Seconds to reuse usage figures before asking a backend again.
    #[serde(default = "default_cache_time")]
    pub cache_time_secs: u64,

    /// Reserved free space in bytes, for upstreams that set none.
    #[serde(default = "default_min_free_space")]
    pub min_free_space: i64,

    /// Participating upstreams, in order.
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
}

/// One upstream in the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Unique name.
    pub name: String,

    /// Host directory backing the upstream. `~` is expanded.
    pub root: PathBuf,

    /// Writability mode.
    #[serde(default)]
    pub mode: UpstreamMode,

    /// Per-upstream reserved free space override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_free_space: Option<i64>,
}

impl UpstreamConfig {
    /// Root with `~` expanded.
    pub fn expanded_root(&self) -> PathBuf {
        let raw = self.root.to_string_lossy();
        PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned())
    }
}

impl UnionConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> UnionResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| UnionError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> UnionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| UnionError::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Structural checks that need no registry.
    pub fn validate(&self) -> UnionResult<()> {
        if self.upstreams.is_empty() {
            return Err(UnionError::config("at least one upstream is required"));
        }
        if self.min_free_space < 0 {
            return Err(UnionError::config("min_free_space must not be negative"));
        }

        let mut seen = HashSet::new();
        for upstream in &self.upstreams {
            if upstream.name.is_empty() {
                return Err(UnionError::config("upstream name must not be empty"));
            }
            if !seen.insert(upstream.name.as_str()) {
                return Err(UnionError::config(format!(
                    "duplicate upstream name: {}",
                    upstream.name
                )));
            }
            if upstream.root.as_os_str().is_empty() {
                return Err(UnionError::config(format!(
                    "upstream {} has an empty root",
                    upstream.name
                )));
            }
            if upstream.min_free_space.is_some_and(|v| v < 0) {
                return Err(UnionError::config(format!(
                    "upstream {}: min_free_space must not be negative",
                    upstream.name
                )));
            }
        }
        Ok(())
    }

    /// Check every configured policy name against `registry`.
    pub fn validate_policies(&self, registry: &PolicyRegistry) -> UnionResult<()> {
        for name in [&self.action_policy, &self.create_policy, &self.search_policy] {
            registry.get(name)?;
        }
        Ok(())
    }

    /// Usage cache lifetime.
    pub fn cache_time(&self) -> Duration {
        Duration::from_secs(self.cache_time_secs)
    }

    /// Reserved free space for `upstream`, falling back to the global value.
    pub fn min_free_space_for(&self, upstream: &UpstreamConfig) -> i64 {
        upstream.min_free_space.unwrap_or(self.min_free_space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UnionConfig::from_toml_str(
            r#"
            [[upstreams]]
            name = "a"
            root = "/mnt/a"
            "#,
        )
        .unwrap();

        assert_eq!(config.action_policy, "epall");
        assert_eq!(config.create_policy, "eplfs");
        assert_eq!(config.search_policy, "epall");
        assert_eq!(config.cache_time(), Duration::from_secs(120));
        assert_eq!(config.upstreams[0].mode, UpstreamMode::ReadWrite);
        assert_eq!(config.min_free_space_for(&config.upstreams[0]), DEFAULT_MIN_FREE_SPACE);
    }

    #[test]
    fn test_full_document() {
        let config = UnionConfig::from_toml_str(
            r#"
            create_policy = "eplno"
            cache_time_secs = 0
            min_free_space = 1024

            [[upstreams]]
            name = "fast"
            root = "/mnt/fast"
            min_free_space = 0

            [[upstreams]]
            name = "archive"
            root = "/mnt/archive"
            mode = "ro"
            "#,
        )
        .unwrap();

        assert_eq!(config.create_policy, "eplno");
        assert_eq!(config.min_free_space_for(&config.upstreams[0]), 0);
        assert_eq!(config.min_free_space_for(&config.upstreams[1]), 1024);
        assert_eq!(config.upstreams[1].mode, UpstreamMode::ReadOnly);
        assert!(config.cache_time().is_zero());
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(matches!(
            UnionConfig::from_toml_str(""),
            Err(UnionError::Config(_))
        ));

        let dup = r#"
            [[upstreams]]
            name = "a"
            root = "/x"
            [[upstreams]]
            name = "a"
            root = "/y"
        "#;
        let err = UnionConfig::from_toml_str(dup).unwrap_err();
        assert!(err.to_string().contains("duplicate upstream name"));
    }

    #[test]
    fn test_rejects_unknown_mode_and_fields() {
        let bad_mode = r#"
            [[upstreams]]
            name = "a"
            root = "/x"
            mode = "rx"
        "#;
        assert!(UnionConfig::from_toml_str(bad_mode).is_err());

        let bad_field = r#"
            search = "epall"
            [[upstreams]]
            name = "a"
            root = "/x"
        "#;
        assert!(UnionConfig::from_toml_str(bad_field).is_err());
    }

    #[test]
    fn test_validate_policies() {
        let mut config = UnionConfig::from_toml_str(
            r#"
            [[upstreams]]
            name = "a"
            root = "/x"
            "#,
        )
        .unwrap();
        let registry = PolicyRegistry::with_builtin();
        config.validate_policies(&registry).unwrap();

        config.search_policy = "ff".to_string();
        assert!(matches!(
            config.validate_policies(&registry),
            Err(UnionError::UnknownPolicy(name)) if name == "ff"
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("union.toml");
        std::fs::write(&path, "[[upstreams]]\nname = \"a\"\nroot = \"~/a\"\n").unwrap();

        let config = UnionConfig::load(&path).unwrap();
        assert!(config.upstreams[0].expanded_root().ends_with("a"));

        assert!(UnionConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
