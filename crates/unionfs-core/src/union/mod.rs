//! Union layer: upstream handles, listed entries, configuration and the
//! namespace that routes requests through policies.

mod config;
mod entry;
mod error;
mod namespace;
mod upstream;

pub use config::{UnionConfig, UpstreamConfig, DEFAULT_CACHE_TIME_SECS, DEFAULT_MIN_FREE_SPACE};
pub use entry::Entry;
pub use error::{UnionError, UnionResult};
pub use namespace::Union;
pub use upstream::{Upstream, UpstreamMode};
