//! Cache-aside layer over Redis for the Circles backend.
//!
//! ## Architecture
//!
//! ```text
//! domain service → EntityCache → CacheAside → CacheStore → CacheBackend (Redis)
//!                                    ↑
//!                  WarmupScheduler ──┘ ← HotDataProvider
//! ```
//!
//! - **Keys**: deterministic `{prefix}:{id}` / `{prefix}:{sub}:{id}` strings
//! - **CacheStore**: JSON-typed wrapper with a store-wide default TTL
//! - **CacheAside**: load-on-miss, invalidation, warmup and forced refresh
//! - **WarmupScheduler**: bounded-concurrency bulk warmup, periodic refresh
//! - **EntityCache**: per-entity keys, TTL classes and invalidation sets
//!
//! ## Graceful Degradation
//!
//! The cache never decides correctness. If Redis is unavailable every read
//! falls through to the system of record; only latency suffers.

pub mod aside;
pub mod config;
pub mod entity;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod observability;
pub mod store;
pub mod warmup;

pub use aside::{BatchReport, CacheAside, LoadFuture, Loader, WarmupItem, WarmupOutcome, loader};
pub use config::{CacheConfig, LoggingConfig, RedisConfig, TtlConfig, WarmupConfig};
pub use entity::{EntityCache, EntityRef};
pub use error::{CacheError, CacheErrorCategory, LoaderError, Result};
pub use keys::EntityKind;
pub use observability::{
    apply_logging_level, init_tracing, init_tracing_from_config, init_tracing_to_stderr,
    init_tracing_with_level,
};
pub use store::{CacheBackend, CacheStore, KeyTtl, MemoryBackend, RedisBackend};
pub use warmup::{HotDataProvider, HotKind, KindReport, WarmupScheduler, WarmupSummary};

/// Connect the Redis-backed store described by `config`.
pub async fn create_cache_store(config: &CacheConfig) -> Result<CacheStore> {
    store::connect(&config.redis, config.ttl.default_ttl()).await
}

/// All cache components wired over one store.
#[derive(Clone)]
pub struct CacheLayer {
    pub store: CacheStore,
    pub aside: CacheAside,
    pub entities: EntityCache,
    pub warmup: std::sync::Arc<WarmupScheduler>,
}

impl CacheLayer {
    pub fn new(store: CacheStore, config: &CacheConfig) -> Self {
        let aside = CacheAside::new(store.clone());
        let entities = EntityCache::new(aside.clone(), config.ttl.clone());
        let warmup = WarmupScheduler::new(aside.clone(), config.ttl.clone(), config.warmup.clone());
        Self {
            store,
            aside,
            entities,
            warmup: std::sync::Arc::new(warmup),
        }
    }
}
