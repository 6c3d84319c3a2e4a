//! Redis cache backend.
//!
//! Shared best-effort backend over a multiplexed connection manager. Every
//! operation is bounded by a per-op timeout and converts client errors into
//! `CacheError` values; the backend never takes a request down with it.
//! Prefix deletion walks the keyspace with SCAN rather than KEYS so bulk
//! invalidation does not block the backend.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::time::Duration;
use tracing::info;

use super::key::CacheKey;
use super::traits::{CacheBackend, CacheError, CacheResult, CacheStats};

/// Connection configuration for the Redis backend.
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis host
    pub host: String,
    /// Redis port
    pub port: u16,
    /// Optional password
    pub password: Option<String>,
    /// Logical database index (namespace selector)
    pub db: i64,
    /// Timeout for establishing the connection
    pub connect_timeout: Duration,
    /// Timeout applied to every cache operation
    pub op_timeout: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            connect_timeout: Duration::from_secs(5),
            op_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisCacheConfig {
    /// Load the configuration from environment variables.
    ///
    /// - `STOCKPILE_REDIS_HOST` (default: localhost)
    /// - `STOCKPILE_REDIS_PORT` (default: 6379)
    /// - `STOCKPILE_REDIS_PASSWORD` (default: none)
    /// - `STOCKPILE_REDIS_DB` (default: 0)
    /// - `STOCKPILE_REDIS_TIMEOUT` seconds, applied to connect and ops (default: 5)
    pub fn from_env() -> Self {
        let timeout = Duration::from_secs(
            std::env::var("STOCKPILE_REDIS_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        );
        Self {
            host: std::env::var("STOCKPILE_REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("STOCKPILE_REDIS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6379),
            password: std::env::var("STOCKPILE_REDIS_PASSWORD")
                .ok()
                .filter(|s| !s.is_empty()),
            db: std::env::var("STOCKPILE_REDIS_DB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            connect_timeout: timeout,
            op_timeout: timeout,
        }
    }
}

/// Cache backend over a shared Redis instance.
#[derive(Clone)]
pub struct RedisCacheBackend {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisCacheBackend {
    /// Connect to Redis and verify liveness with an initial PING.
    ///
    /// Connection failure here is reported to the caller; whether that is
    /// fatal is the caller's policy (the service treats the cache as
    /// optional and starts without it).
    pub async fn connect(config: &RedisCacheConfig) -> CacheResult<Self> {
        let info = redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: redis::RedisConnectionInfo {
                db: config.db,
                username: None,
                password: config.password.clone(),
                ..Default::default()
            },
        };
        let client = Client::open(info).map_err(|e| CacheError::Backend {
            reason: e.to_string(),
        })?;

        let manager = match tokio::time::timeout(
            config.connect_timeout,
            ConnectionManager::new(client),
        )
        .await
        {
            Ok(Ok(manager)) => manager,
            Ok(Err(e)) => {
                return Err(CacheError::Backend {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(CacheError::Timeout {
                    timeout: config.connect_timeout,
                })
            }
        };

        let backend = Self {
            manager,
            op_timeout: config.op_timeout,
        };
        if !backend.ping().await {
            return Err(CacheError::Backend {
                reason: format!("redis at {}:{} did not answer PING", config.host, config.port),
            });
        }
        info!(host = %config.host, port = config.port, db = config.db, "connected to redis cache");
        Ok(backend)
    }

    async fn with_timeout<T, F>(&self, fut: F) -> CacheResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::Backend {
                reason: e.to_string(),
            }),
            Err(_) => Err(CacheError::Timeout {
                timeout: self.op_timeout,
            }),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let key = key.as_str().to_string();
        self.with_timeout(async move { conn.get::<_, Option<Vec<u8>>>(key).await })
            .await
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let key = key.as_str().to_string();
        let value = value.to_vec();
        // SETEX requires a TTL of at least one second.
        let seconds = ttl.as_secs().max(1);
        self.with_timeout(async move { conn.set_ex::<_, _, ()>(key, value, seconds).await })
            .await
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<u64> {
        let mut conn = self.manager.clone();
        let key = key.as_str().to_string();
        self.with_timeout(async move { conn.del::<_, u64>(key).await })
            .await
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let mut conn = self.manager.clone();
        let pattern = format!("{prefix}*");
        let op_timeout = self.op_timeout;
        let scan_and_delete = async move {
            let mut removed: u64 = 0;
            let mut cursor: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(100)
                    .query_async(&mut conn)
                    .await?;
                if !keys.is_empty() {
                    removed += conn.del::<_, u64>(keys).await?;
                }
                cursor = next;
                if cursor == 0 {
                    break;
                }
            }
            Ok::<u64, redis::RedisError>(removed)
        };
        match tokio::time::timeout(op_timeout, scan_and_delete).await {
            Ok(Ok(removed)) => Ok(removed),
            Ok(Err(e)) => Err(CacheError::Backend {
                reason: e.to_string(),
            }),
            Err(_) => Err(CacheError::Timeout {
                timeout: op_timeout,
            }),
        }
    }

    async fn ping(&self) -> bool {
        let mut conn = self.manager.clone();
        self.with_timeout(async move {
            let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(reply)
        })
        .await
        .map(|reply| reply == "PONG")
        .unwrap_or(false)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let mut conn = self.manager.clone();
        let info: redis::InfoDict = self
            .with_timeout(async move { redis::cmd("INFO").query_async(&mut conn).await })
            .await?;

        let mut conn = self.manager.clone();
        let entry_count: u64 = self
            .with_timeout(async move { redis::cmd("DBSIZE").query_async(&mut conn).await })
            .await
            .unwrap_or(0);

        Ok(CacheStats {
            connected: true,
            hits: info.get("keyspace_hits").unwrap_or(0),
            misses: info.get("keyspace_misses").unwrap_or(0),
            entry_count,
            memory_bytes: info.get("used_memory").unwrap_or(0),
        })
    }
}
