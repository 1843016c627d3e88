mod cli;
mod commands;
mod output;

use std::sync::Arc;

use anyhow::Result;
use circles_cache::config::loader::load_config;
use circles_cache::{CacheConfig, CacheLayer, CacheStore, RedisBackend};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    let mut config = load_config(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    if let Some(url) = &cli.redis_url {
        config.redis.url = url.clone();
    }
    let level = if cli.verbose { "debug" } else { "warn" };
    circles_cache::observability::init_tracing_to_stderr(level);

    match &cli.command {
        Commands::Key(args) => commands::keys::key(args),
        Commands::Kinds => commands::keys::kinds(&config, format),
        Commands::Inspect(args) => {
            let layer = open_layer(&config).await?;
            commands::inspect::inspect(&layer.store, &args.key, format).await?;
        }
        Commands::Invalidate(args) => {
            let layer = open_layer(&config).await?;
            commands::invalidate::invalidate(&layer.aside, &args.keys).await?;
        }
        Commands::InvalidateRelated(args) => {
            let layer = open_layer(&config).await?;
            commands::invalidate::invalidate_related(&layer.entities, &args.target, args.dry_run)
                .await?;
        }
    }

    Ok(())
}

/// Connect to Redis, failing fast if it is unreachable.
///
/// The library degrades silently when Redis is down; an operator tool must not.
async fn open_layer(config: &CacheConfig) -> Result<CacheLayer> {
    let backend = RedisBackend::from_config(&config.redis)?;
    if !backend.is_available().await {
        anyhow::bail!("Redis at {} is not reachable", config.redis.url);
    }
    let store = CacheStore::new(Arc::new(backend), config.ttl.default_ttl());
    Ok(CacheLayer::new(store, config))
}
