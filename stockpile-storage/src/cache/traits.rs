//! Cache backend trait and error/stats types.
//!
//! Backends are byte-oriented: serialization of the cached values belongs to
//! the repository, which keeps the stored format schema-bound instead of
//! opaque. Every operation returns an explicit `Result` so the caller's
//! policy, not exception suppression, decides what a failure means.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::key::CacheKey;

/// Cache-layer errors.
///
/// These never cross into the repository's error channel; the repository
/// downgrades them to a miss or no-op and logs at warning level.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {reason}")]
    Backend { reason: String },

    #[error("Cache operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Cache serialization fault: {reason}")]
    Serialization { reason: String },
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations must be thread-safe, bound every network wait with a
/// timeout, and convert backend faults into `CacheError` values rather than
/// panicking. An expired entry is indistinguishable from an absent one.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get raw bytes for a key. `Ok(None)` is a miss (absent or expired).
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;

    /// Store bytes under a key with the given time-to-live.
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Delete one key. Returns the number of keys removed (0 or 1).
    async fn delete(&self, key: &CacheKey) -> CacheResult<u64>;

    /// Delete every key under a prefix. Returns the number of keys removed.
    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64>;

    /// Lightweight liveness probe. Must not error; an unreachable backend is
    /// simply `false`.
    async fn ping(&self) -> bool;

    /// Backend statistics for observability. No correctness role.
    async fn stats(&self) -> CacheResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Whether the backend was reachable when the stats were collected.
    pub connected: bool,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Approximate memory usage in bytes.
    pub memory_bytes: u64,
}

impl CacheStats {
    /// Stats for an unreachable or disabled backend.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
