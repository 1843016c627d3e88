//! In-memory [`CacheBackend`] using DashMap.
//!
//! Mirrors the expiry semantics of the Redis backend so orchestration code
//! can be exercised without a server. Expired entries are dropped lazily on
//! access.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{CacheBackend, KeyTtl};
use crate::error::Result;

/// A stored value with its expiration deadline.
#[derive(Clone, Debug)]
struct MemoryEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// In-memory cache backend.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.is_expired())
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn live(&self, key: &str) -> Option<MemoryEntry> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove_if(key, |_, e| e.is_expired());
            return None;
        }
        Some(entry.clone())
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.live(key).map(|e| e.data))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), MemoryEntry::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live(key).is_some())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(MemoryEntry::new(value, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(MemoryEntry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired() => {
                entry.expires_at = Instant::now().checked_add(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        Ok(match self.live(key) {
            None => KeyTtl::Missing,
            Some(MemoryEntry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(MemoryEntry {
                expires_at: Some(deadline),
                ..
            }) => KeyTtl::Expires(deadline.saturating_duration_since(Instant::now())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_delete() {
        let backend = MemoryBackend::new();

        backend
            .set("post:1", b"hello".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.get("post:1").await.unwrap(), Some(b"hello".to_vec()));
        assert!(backend.exists("post:1").await.unwrap());

        backend.delete("post:1").await.unwrap();
        assert_eq!(backend.get("post:1").await.unwrap(), None);
        assert!(!backend.exists("post:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiration() {
        let backend = MemoryBackend::new();

        backend
            .set("expiring", b"v".to_vec(), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(backend.exists("expiring").await.unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(backend.get("expiring").await.unwrap(), None);
        assert_eq!(backend.ttl("expiring").await.unwrap(), KeyTtl::Missing);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let backend = MemoryBackend::new();
        let ttl = Duration::from_secs(60);

        assert!(backend.set_if_absent("code:verify:a", b"1".to_vec(), ttl).await.unwrap());
        assert!(!backend.set_if_absent("code:verify:a", b"2".to_vec(), ttl).await.unwrap());
        assert_eq!(backend.get("code:verify:a").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_set_if_absent_replaces_expired_entry() {
        let backend = MemoryBackend::new();

        backend
            .set("k", b"old".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(
            backend
                .set_if_absent("k", b"new".to_vec(), Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert_eq!(backend.get("k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_expire_and_ttl() {
        let backend = MemoryBackend::new();

        assert!(!backend.expire("absent", Duration::from_secs(5)).await.unwrap());

        backend
            .set("session:s", b"{}".to_vec(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(backend.expire("session:s", Duration::from_secs(120)).await.unwrap());

        let remaining = backend.ttl("session:s").await.unwrap().remaining().unwrap();
        assert!(remaining > Duration::from_secs(100));
        assert!(remaining <= Duration::from_secs(120));
    }
}
