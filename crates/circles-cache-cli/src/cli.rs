use circles_cache::EntityKind;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "circles-cache")]
#[command(about = "Inspect and invalidate the Circles Redis cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (defaults to ./circles-cache.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Redis URL (overrides the config file)
    #[arg(long, global = true, env = "CIRCLES_CACHE_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log cache internals to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the cache key for an entity
    Key(KeyArgs),
    /// List key prefixes and their configured TTL
    Kinds,
    /// Show existence, TTL and value of a key
    Inspect(InspectArgs),
    /// Delete keys (continues past individual failures)
    Invalidate(InvalidateArgs),
    /// Delete every key affected by a write to an entity
    InvalidateRelated(InvalidateRelatedArgs),
}

fn parse_kind(s: &str) -> Result<EntityKind, String> {
    s.parse()
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Entity kind prefix (e.g. post, user_profile, count)
    #[arg(value_parser = parse_kind)]
    pub kind: EntityKind,
    /// Entity id or token
    pub id: String,
    /// Sub-prefix for composite keys (e.g. `post` for count:post:{id})
    #[arg(long)]
    pub sub: Option<String>,
}

#[derive(clap::Args)]
pub struct InspectArgs {
    /// Full cache key (e.g. post:42)
    pub key: String,
}

#[derive(clap::Args)]
pub struct InvalidateArgs {
    /// Keys to delete
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(clap::Args)]
pub struct InvalidateRelatedArgs {
    #[command(subcommand)]
    pub target: RelatedTarget,

    /// Print the affected keys without deleting them
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum RelatedTarget {
    /// A post and the counters and timelines it appears in
    Post {
        id: i64,
        /// Author of the post
        #[arg(long)]
        author: i64,
        /// Circle the post was shared to
        #[arg(long)]
        circle: Option<i64>,
    },
    /// A user, their profile, stats and timelines
    User {
        id: i64,
        /// Also drop the username lookup key
        #[arg(long)]
        username: Option<String>,
    },
    /// A circle, its member count and timeline
    Circle { id: i64 },
}
