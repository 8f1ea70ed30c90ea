//! Union error types.

use thiserror::Error;

use crate::vfs::VfsError;

/// Error returned by selection policies and the union layer.
#[derive(Debug, Error)]
pub enum UnionError {
    /// No upstream holds the path, or the candidate set was empty.
    #[error("object not found")]
    ObjectNotFound,

    /// Every candidate is at or below its reserved free space.
    #[error("no upstreams found with more than min_free_space space spare")]
    NoSpaceAboveReserve,

    /// Every candidate is read-only (or no-create, for creation).
    #[error("permission denied: no writable upstream")]
    PermissionDenied,

    /// The caller cancelled the request.
    #[error("operation cancelled")]
    Cancelled,

    /// An upstream cannot report a capacity figure.
    #[error("{metric} is not supported by upstream {upstream}")]
    MetricUnsupported {
        upstream: String,
        metric: &'static str,
    },

    /// No policy registered under this name.
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),

    /// Invalid union configuration.
    #[error("invalid config: {0}")]
    Config(String),

    /// A backend call failed.
    #[error("upstream {upstream}: {source}")]
    Upstream {
        upstream: String,
        #[source]
        source: VfsError,
    },
}

impl UnionError {
    /// Create an Upstream error.
    pub fn upstream(name: impl Into<String>, source: VfsError) -> Self {
        Self::Upstream {
            upstream: name.into(),
            source,
        }
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Union result type.
pub type UnionResult<T> = Result<T, UnionError>;
