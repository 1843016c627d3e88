//! Cache-aside orchestration.
//!
//! ## Read Path
//!
//! ```text
//! get_or_load → store.get ─hit──────────────→ value
//!                   │
//!                miss / transport error
//!                   ↓
//!               loader() ─err→ CacheError::Loader
//!                   ↓
//!               store.set (failure logged, not returned) → value
//! ```
//!
//! The cache is an accelerator only: with the store fully down every read
//! still succeeds through the loader. Concurrent misses on the same key may
//! each call the loader; the last write wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CacheError, LoaderError, Result};
use crate::store::CacheStore;

/// Boxed future returned by a [`Loader`].
pub type LoadFuture<T> = BoxFuture<'static, std::result::Result<T, LoaderError>>;

/// Reusable fetch-from-source function.
///
/// Used where a loader has to be stored (batch warmup items); one-shot calls
/// take a plain closure instead.
pub type Loader<T> = Arc<dyn Fn() -> LoadFuture<T> + Send + Sync>;

/// Wrap an async closure as a [`Loader`].
pub fn loader<T, F, Fut>(f: F) -> Loader<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, LoaderError>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// One deferred load-and-store operation in a warmup batch.
pub struct WarmupItem<T> {
    pub key: String,
    pub loader: Loader<T>,
    /// Zero means the store default.
    pub ttl: Duration,
}

impl<T> WarmupItem<T> {
    pub fn new(key: impl Into<String>, ttl: Duration, loader: Loader<T>) -> Self {
        Self {
            key: key.into(),
            loader,
            ttl,
        }
    }
}

/// Result of warming a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupOutcome {
    /// The key was already cached; the loader was not called.
    Skipped,
    /// The key was absent and has been loaded and stored.
    Loaded,
}

/// Soft-failure report for batch operations.
///
/// A non-`None` `last_error` means some work was lost; it never indicates
/// corrupted cache contents.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub last_error: Option<CacheError>,
}

impl BatchReport {
    /// Returns `true` if every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, result: Result<()>) {
        self.attempted += 1;
        match result {
            Ok(()) => self.succeeded += 1,
            Err(e) => {
                self.failed += 1;
                self.last_error = Some(e);
            }
        }
    }

    /// Collapse into the success count, or the last error if any item failed.
    pub fn into_result(self) -> Result<usize> {
        match self.last_error {
            Some(e) => Err(e),
            None => Ok(self.succeeded),
        }
    }
}

/// Cache-aside orchestrator over a [`CacheStore`].
#[derive(Clone, Debug)]
pub struct CacheAside {
    store: CacheStore,
}

impl CacheAside {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Return the cached value for `key`, loading and caching it on a miss.
    ///
    /// Store failures on read are treated as misses and write-back failures
    /// are logged only. The only error surfaced is [`CacheError::Loader`].
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoaderError>>,
    {
        match self.store.get::<T>(key).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_miss() => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, falling back to loader");
            }
        }

        crate::metrics::record_loader_call();
        let value = loader().await.map_err(|e| CacheError::loader(key, e))?;

        if let Err(e) = self.store.set(key, &value, ttl).await {
            let e = CacheError::write(key, e);
            tracing::warn!(key = %key, error = %e, "failed to write loaded value back to cache");
        }

        Ok(value)
    }

    /// Delete a single key.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.store.delete(key).await.inspect_err(|e| {
            tracing::warn!(key = %key, error = %e, "cache invalidation failed");
        })
    }

    /// Delete several keys, continuing past individual failures.
    ///
    /// Returns the last error seen. Callers that need per-key diagnostics
    /// should call [`invalidate`](Self::invalidate) themselves.
    pub async fn invalidate_multiple<I, S>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut last_error = None;
        for key in keys {
            if let Err(e) = self.invalidate(key.as_ref()).await {
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Populate `key` if it is absent.
    ///
    /// An existing entry always wins, even if stale. Unlike
    /// [`get_or_load`](Self::get_or_load) every failure is returned.
    pub async fn warmup<T, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<WarmupOutcome>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoaderError>>,
    {
        if self.store.exists(key).await? {
            tracing::debug!(key = %key, "warmup skipped, key already cached");
            return Ok(WarmupOutcome::Skipped);
        }

        let value = loader().await.map_err(|e| CacheError::loader(key, e))?;
        self.store
            .set(key, &value, ttl)
            .await
            .map_err(|e| CacheError::write(key, e))?;
        Ok(WarmupOutcome::Loaded)
    }

    /// Warm each item in order. Always runs to completion.
    pub async fn warmup_batch<T: Serialize>(&self, items: Vec<WarmupItem<T>>) -> BatchReport {
        let mut report = BatchReport::default();
        for item in items {
            let result = self
                .warmup(&item.key, item.ttl, || (item.loader)())
                .await
                .map(|_| ());
            if let Err(e) = &result {
                tracing::warn!(key = %item.key, error = %e, "warmup item failed");
            }
            report.record(result);
        }
        tracing::debug!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "warmup batch finished"
        );
        report
    }

    /// Reload `key` from the source and overwrite it regardless of cache state.
    pub async fn refresh_cache<T, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoaderError>>,
    {
        let value = loader().await.map_err(|e| CacheError::loader(key, e))?;
        self.store
            .set(key, &value, ttl)
            .await
            .map_err(|e| CacheError::write(key, e))?;
        Ok(value)
    }
}
