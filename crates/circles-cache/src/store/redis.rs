//! Redis-backed [`CacheBackend`] over a deadpool connection pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use super::{CacheBackend, CacheStore, KeyTtl};
use crate::config::RedisConfig;
use crate::error::{CacheError, Result};

/// Cache backend that talks to Redis.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Wrap an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from configuration. Does not open a connection.
    pub fn from_config(config: &RedisConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| CacheError::config(format!("failed to create Redis pool: {e}")))?;
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check if Redis is reachable (for health checks).
    pub async fn is_available(&self) -> bool {
        match self.pool.get().await {
            Ok(mut conn) => redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[inline]
fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await?;
        let data = conn.get::<_, Option<Vec<u8>>>(key).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Redis GET error");
            CacheError::from(e)
        })?;
        Ok(data)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.pool.get().await?;
        conn.pset_ex::<_, _, ()>(key, value.as_slice(), millis(ttl))
            .await
            .map_err(|e| {
                tracing::warn!(key = %key, error = %e, "Redis SET error");
                CacheError::from(e)
            })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(key).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Redis DEL error");
            CacheError::from(e)
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        Ok(conn.exists::<_, bool>(key).await?)
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let reply = redis::cmd("SET")
            .arg(key)
            .arg(value.as_slice())
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async::<Option<String>>(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let updated = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .query_async::<bool>(&mut conn)
            .await?;
        Ok(updated)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let mut conn = self.pool.get().await?;
        let pttl = redis::cmd("PTTL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(match pttl {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            ms => KeyTtl::Expires(Duration::from_millis(ms.max(0) as u64)),
        })
    }
}

/// Create a Redis-backed [`CacheStore`].
///
/// ## Graceful Degradation
///
/// Only an invalid pool configuration is an error. If Redis cannot be reached
/// at startup the store is still returned: every read falls through to the
/// system of record until Redis comes back.
pub async fn connect(config: &RedisConfig, default_ttl: Duration) -> Result<CacheStore> {
    tracing::info!(url = %config.url, pool_size = config.pool_size, "Connecting to Redis");

    let backend = RedisBackend::from_config(config)?;
    if backend.is_available().await {
        tracing::info!("Connected to Redis successfully");
    } else {
        tracing::warn!(
            url = %config.url,
            "Redis is not reachable; cache reads will fall through to the source"
        );
    }

    Ok(CacheStore::new(Arc::new(backend), default_ttl))
}
