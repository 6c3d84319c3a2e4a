//! In-memory cache backend.
//!
//! Used by tests and cache-less local deployments. Expiry is enforced on
//! read, so an expired entry is reported as a miss even before it is pruned.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::key::CacheKey;
use super::traits::{CacheBackend, CacheResult, CacheStats};

struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Process-local cache backend over a `RwLock<HashMap>`.
#[derive(Default)]
pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCacheBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry whose TTL has elapsed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries
            .write()
            .unwrap()
            .retain(|_, e| e.expires_at > now);
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap();
        match entries.get(key.as_str()) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.as_str().to_string(),
            MemoryEntry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<u64> {
        let mut entries = self.entries.write().unwrap();
        Ok(u64::from(entries.remove(key.as_str()).is_some()))
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let entries = self.entries.read().unwrap();
        let memory_bytes = entries
            .iter()
            .map(|(k, e)| (k.len() + e.value.len()) as u64)
            .sum();
        Ok(CacheStats {
            connected: true,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: entries.len() as u64,
            memory_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::QUERY_PREFIX;
    use stockpile_core::new_record_id;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let backend = MemoryCacheBackend::new();
        let key = CacheKey::record(new_record_id());

        backend
            .set(&key, b"payload", Duration::from_secs(60))
            .await
            .unwrap();
        let value = backend.get(&key).await.unwrap();
        assert_eq!(value.as_deref(), Some(b"payload".as_ref()));
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss() {
        let backend = MemoryCacheBackend::new();
        let key = CacheKey::record(new_record_id());

        backend.set(&key, b"payload", Duration::ZERO).await.unwrap();
        assert_eq!(backend.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_reports_removed_count() {
        let backend = MemoryCacheBackend::new();
        let key = CacheKey::record(new_record_id());

        backend
            .set(&key, b"x", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.delete(&key).await.unwrap(), 1);
        assert_eq!(backend.delete(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_prefix_only_touches_namespace() {
        let backend = MemoryCacheBackend::new();
        let record_key = CacheKey::record(new_record_id());
        let query_key = CacheKey::query(&Default::default());

        backend
            .set(&record_key, b"r", Duration::from_secs(60))
            .await
            .unwrap();
        backend
            .set(&query_key, b"q", Duration::from_secs(60))
            .await
            .unwrap();

        let removed = backend.delete_prefix(QUERY_PREFIX).await.unwrap();
        assert_eq!(removed, 1);
        assert!(backend.get(&record_key).await.unwrap().is_some());
        assert!(backend.get(&query_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_count_hits_and_misses() {
        let backend = MemoryCacheBackend::new();
        let key = CacheKey::record(new_record_id());

        backend
            .set(&key, b"x", Duration::from_secs(60))
            .await
            .unwrap();
        backend.get(&key).await.unwrap();
        backend.get(&CacheKey::record(new_record_id())).await.unwrap();

        let stats = backend.stats().await.unwrap();
        assert!(stats.connected);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert!(stats.memory_bytes > 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let backend = MemoryCacheBackend::new();
        backend
            .set(&CacheKey::record(new_record_id()), b"x", Duration::ZERO)
            .await
            .unwrap();
        backend
            .set(
                &CacheKey::record(new_record_id()),
                b"y",
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        backend.purge_expired();
        assert_eq!(backend.len(), 1);
    }
}
