//! Stockpile Storage - record store trait, cache subsystem, and the
//! cache-coherent repository.
//!
//! The durable PostgreSQL adapter lives in `stockpile-pg`; this crate defines
//! the seams (`RecordStore`, `CacheBackend`), the in-memory implementations
//! used by tests and local development, the Redis cache backend, and the
//! repository that composes store and cache under one invalidation and
//! degradation policy.

pub mod cache;
pub mod repository;
pub mod store;
pub mod validation;

pub use cache::{
    CacheBackend, CacheError, CacheKey, CacheResult, CacheSettings, CacheStats,
    MemoryCacheBackend, RedisCacheBackend, RedisCacheConfig, QUERY_PREFIX, RECORD_PREFIX,
};
pub use repository::CachedRecordStore;
pub use store::{MemoryRecordStore, RecordStore};
