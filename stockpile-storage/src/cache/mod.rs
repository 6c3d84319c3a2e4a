//! Cache subsystem: key namespace, backend trait, and backends.
//!
//! The cache is a best-effort layer. Backends report failures as explicit
//! `CacheError` values and the repository downgrades every one of them to a
//! miss or no-op, so a cache outage costs latency, never correctness.
//!
//! # Key namespaces
//!
//! Single records live under `record:{id}`; list queries live under
//! `records:query:{signature}`. Any write deletes the mutated record's key
//! and the whole query namespace, because any listing could include the
//! mutated record. Over-invalidation is always safe; under-invalidation
//! never is.

pub mod key;
pub mod memory_backend;
pub mod redis_backend;
pub mod settings;
pub mod traits;

pub use key::{CacheKey, QUERY_PREFIX, RECORD_PREFIX};
pub use memory_backend::MemoryCacheBackend;
pub use redis_backend::{RedisCacheBackend, RedisCacheConfig};
pub use settings::CacheSettings;
pub use traits::{CacheBackend, CacheError, CacheResult, CacheStats};
