//! Shared fixtures for cache integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use circles_cache::{
    CacheBackend, CacheError, CacheStore, HotDataProvider, HotKind, KeyTtl, LoaderError,
    MemoryBackend, Result,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
}

impl Post {
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
        }
    }
}

pub fn memory_store() -> (MemoryBackend, CacheStore) {
    let backend = MemoryBackend::new();
    let store = CacheStore::new(Arc::new(backend.clone()), DEFAULT_TTL);
    (backend, store)
}

pub fn faulty_store() -> (Arc<FaultyBackend>, CacheStore) {
    let backend = Arc::new(FaultyBackend::default());
    let store = CacheStore::new(backend.clone(), DEFAULT_TTL);
    (backend, store)
}

/// Memory backend with injectable failures.
#[derive(Default)]
pub struct FaultyBackend {
    pub inner: MemoryBackend,
    down: AtomicBool,
    fail_writes: AtomicBool,
    failing_deletes: Mutex<HashSet<String>>,
}

impl FaultyBackend {
    /// Every operation fails as if Redis were unreachable.
    pub fn take_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    fn check_up(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(CacheError::transport("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FaultyBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_up()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.check_up()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::transport("READONLY replica"));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_up()?;
        if self.failing_deletes.lock().unwrap().contains(key) {
            return Err(CacheError::transport(format!("DEL {key} failed")));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check_up()?;
        self.inner.exists(key).await
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        self.check_up()?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.check_up()?;
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.check_up()?;
        self.inner.ttl(key).await
    }
}

/// Hot data provider with fixed identifiers and load instrumentation.
#[derive(Default)]
pub struct TestProvider {
    ids: HashMap<HotKind, Vec<i64>>,
    failing_ids: HashSet<i64>,
    missing_ids: HashSet<i64>,
    failing_kinds: HashSet<HotKind>,
    delay: Duration,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl TestProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(mut self, kind: HotKind, ids: impl IntoIterator<Item = i64>) -> Self {
        self.ids.insert(kind, ids.into_iter().collect());
        self
    }

    pub fn failing(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.failing_ids.extend(ids);
        self
    }

    pub fn missing(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.missing_ids.extend(ids);
        self
    }

    pub fn failing_kind(mut self, kind: HotKind) -> Self {
        self.failing_kinds.insert(kind);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of concurrent `load_entity` calls observed.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn loads_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn loads_finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn into_dyn(self) -> Arc<dyn HotDataProvider> {
        Arc::new(self)
    }
}

#[async_trait]
impl HotDataProvider for TestProvider {
    async fn hot_identifiers(
        &self,
        kind: HotKind,
        limit: usize,
    ) -> std::result::Result<Vec<i64>, LoaderError> {
        if self.failing_kinds.contains(&kind) {
            return Err(format!("ranking query for {kind} failed").into());
        }
        let ids = self.ids.get(&kind).cloned().unwrap_or_default();
        Ok(ids.into_iter().take(limit).collect())
    }

    async fn load_entity(
        &self,
        kind: HotKind,
        id: i64,
    ) -> std::result::Result<Option<serde_json::Value>, LoaderError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);

        if self.failing_ids.contains(&id) {
            return Err(format!("row {id} unreadable").into());
        }
        if self.missing_ids.contains(&id) {
            return Ok(None);
        }
        Ok(Some(serde_json::json!({ "id": id, "kind": kind.name() })))
    }
}
