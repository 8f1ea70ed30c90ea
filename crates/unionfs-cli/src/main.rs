//! unionfs: inspect upstream selection decisions.
//!
//! Usage:
//!   unionfs --config union.toml policies
//!   unionfs --config union.toml select create /media/new.mkv
//!   unionfs --config union.toml select search /media/a.mkv --policy eplno --seed 7
//!   unionfs --config union.toml ls /media
//!
//! Nothing is read or written on the upstreams beyond existence checks,
//! listings and usage queries. Logs go to stderr (`RUST_LOG`, default `info`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use unionfs_core::{Category, Policy, PolicyRegistry, Union, UnionConfig, Upstream};

/// Print the upstreams a union would pick for a request.
#[derive(Parser, Debug)]
#[command(name = "unionfs")]
#[command(about = "Inspect upstream selection for a union filesystem")]
struct Args {
    /// Union configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered policies and the configured ones
    Policies,

    /// Show which upstream(s) a request would use
    Select {
        /// Operation category: action, create or search
        category: Category,

        /// Union path, e.g. /media/a.mkv
        path: PathBuf,

        /// Use this policy instead of the configured one
        #[arg(long)]
        policy: Option<String>,

        /// Seed tie-breaks for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Merged directory listing
    Ls {
        /// Union directory path
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = UnionConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let seed = match &args.command {
        Command::Select { seed, .. } => *seed,
        _ => None,
    };
    let registry = match seed {
        Some(seed) => PolicyRegistry::with_builtin_seeded(seed),
        None => PolicyRegistry::with_builtin(),
    };
    config.validate_policies(&registry)?;

    let ctx = CancellationToken::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            interrupt.cancel();
        }
    });

    match args.command {
        Command::Policies => {
            for name in registry.names() {
                println!("{name}");
            }
            println!();
            println!("action = {}", config.action_policy);
            println!("create = {}", config.create_policy);
            println!("search = {}", config.search_policy);
        }
        Command::Select {
            category,
            path,
            policy,
            ..
        } => {
            let mut union = Union::from_config(&config, &registry)?;
            if let Some(name) = policy {
                union = with_policy(union, category, registry.get(&name)?);
            }
            tracing::debug!(
                %category,
                path = %path.display(),
                policy = union.policy(category).name(),
                "selecting"
            );

            let chosen = union.select(&ctx, category, &path).await?;
            for upstream in chosen {
                println!("{}\t{}", upstream.name(), location(&upstream, &path).display());
            }
        }
        Command::Ls { path } => {
            let union = Union::from_config(&config, &registry)?;
            for entry in union.readdir(&ctx, &path).await? {
                let marker = if entry.is_dir() { "/" } else { "" };
                println!(
                    "{}{marker}\t{}\t{}",
                    entry.name(),
                    entry.size(),
                    entry.upstream().name()
                );
            }
        }
    }

    Ok(())
}

/// Host path of `path` on `upstream`, or its backend path when the
/// backend is not a host directory.
fn location(upstream: &Upstream, path: &Path) -> PathBuf {
    upstream
        .host_path(path)
        .unwrap_or_else(|| upstream.backend_path(path))
}

/// Rebuild `union` with `policy` serving `category`.
fn with_policy(union: Union, category: Category, policy: Arc<dyn Policy>) -> Union {
    let pick = |c: Category| {
        if c == category {
            Arc::clone(&policy)
        } else {
            Arc::clone(union.policy(c))
        }
    };
    Union::new(
        union.upstreams().to_vec(),
        pick(Category::Action),
        pick(Category::Create),
        pick(Category::Search),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use unionfs_core::{LocalBackend, MemoryBackend};

    #[test]
    fn test_location_prefers_host_path() {
        let local = Upstream::new("disk1", LocalBackend::new("/srv/disk1"));
        assert_eq!(
            location(&local, Path::new("/media/x.mkv")),
            PathBuf::from("/srv/disk1/media/x.mkv")
        );

        let memory = Upstream::new("mem", MemoryBackend::new()).with_root("share");
        assert_eq!(
            location(&memory, Path::new("/media/x.mkv")),
            PathBuf::from("share/media/x.mkv")
        );
    }
}
