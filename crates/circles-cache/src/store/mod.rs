//! Typed cache store over a remote key-value backend.
//!
//! ## Layers
//!
//! - [`CacheBackend`]: narrow byte-level capability (GET/SET/DEL/EXISTS/
//!   SET NX/EXPIRE/TTL) implemented by [`RedisBackend`] and [`MemoryBackend`]
//! - [`CacheStore`]: JSON encoding, default expiration and metrics on top of
//!   any backend
//!
//! Every call is one round trip to the backend. Nothing is cached locally at
//! this layer; expiry is delegated to the backend entirely.

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CacheError, Result};

pub use memory::MemoryBackend;
pub use self::redis::{RedisBackend, connect};

/// Remaining lifetime of a key as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// No such key.
    Missing,
    /// Key exists without an expiration.
    Persistent,
    /// Key expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    /// Returns `true` if the key exists.
    pub fn exists(&self) -> bool {
        !matches!(self, KeyTtl::Missing)
    }

    /// Remaining time, if the key exists and expires.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            KeyTtl::Expires(d) => Some(*d),
            _ => None,
        }
    }
}

/// Byte-level key-value capability required by the cache.
///
/// Implementations must be thread-safe and issue exactly one backend call per
/// method. A TTL passed here is always non-zero; default handling happens in
/// [`CacheStore`].
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the raw value. `Ok(None)` means the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value with expiration, overwriting any existing value.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Remove a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether a key is present.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Store a value only if the key is absent. Returns `true` if written.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool>;

    /// Reset the expiration of an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Query the remaining lifetime of a key.
    async fn ttl(&self, key: &str) -> Result<KeyTtl>;
}

/// Typed cache store.
///
/// Values are JSON-encoded before transmission and decoded into the caller's
/// type on read. A `ttl` of [`Duration::ZERO`] means "use the store-wide
/// default", never "no expiry".
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
}

impl CacheStore {
    /// Create a store over the given backend.
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
        }
    }

    /// Store-wide default expiration.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    #[inline]
    fn effective_ttl(&self, ttl: Duration) -> Duration {
        if ttl.is_zero() { self.default_ttl } else { ttl }
    }

    /// Get a value, decoding it into `T`.
    ///
    /// Returns [`CacheError::Miss`] if the key is absent and
    /// [`CacheError::Serialization`] if the stored bytes do not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let data = match self.backend.get(key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                crate::metrics::record_cache_miss();
                return Err(CacheError::miss(key));
            }
            Err(e) => {
                crate::metrics::record_cache_error("get");
                return Err(e);
            }
        };

        let value = serde_json::from_slice(&data).map_err(|e| {
            crate::metrics::record_cache_error("decode");
            CacheError::serialization(key, e)
        })?;
        tracing::debug!(key = %key, "cache hit");
        crate::metrics::record_cache_hit();
        Ok(value)
    }

    /// Like [`get`](Self::get) but maps a miss to `Ok(None)`.
    pub async fn get_optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_miss() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Encode and store a value.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let data = serde_json::to_vec(value).map_err(|e| CacheError::serialization(key, e))?;
        let ttl = self.effective_ttl(ttl);
        self.backend.set(key, data, ttl).await.inspect_err(|_| {
            crate::metrics::record_cache_error("set");
        })?;
        tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set");
        Ok(())
    }

    /// Remove a key.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await.inspect_err(|_| {
            crate::metrics::record_cache_error("delete");
        })?;
        tracing::debug!(key = %key, "cache delete");
        Ok(())
    }

    /// Check whether a key is present.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.backend.exists(key).await.inspect_err(|_| {
            crate::metrics::record_cache_error("exists");
        })
    }

    /// Store a value only if the key is absent. Returns `true` if written.
    pub async fn set_if_absent<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<bool> {
        let data = serde_json::to_vec(value).map_err(|e| CacheError::serialization(key, e))?;
        self.backend
            .set_if_absent(key, data, self.effective_ttl(ttl))
            .await
            .inspect_err(|_| {
                crate::metrics::record_cache_error("set_if_absent");
            })
    }

    /// Reset the expiration of an existing key. Returns `false` if the key is absent.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.backend
            .expire(key, self.effective_ttl(ttl))
            .await
            .inspect_err(|_| {
                crate::metrics::record_cache_error("expire");
            })
    }

    /// Query the remaining lifetime of a key.
    pub async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.backend.ttl(key).await.inspect_err(|_| {
            crate::metrics::record_cache_error("ttl");
        })
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
