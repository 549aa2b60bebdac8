//! Key-value cache with expiry.
//!
//! Two backends behind one enum: Redis for deployments, an in-process Moka
//! cache when no `REDIS_URL` is configured. Both are safe to share across request
//! tasks and the periodic job; callers clone the handle.

use std::time::Duration;

use redis::aio::ConnectionManager;
use tracing::debug;

use crate::errors::{CacheError, CacheResult};

// ---

#[derive(Clone)]
pub enum CacheStore {
    Redis(RedisCache),
    Memory(MemoryCache),
}

impl CacheStore {
    /// Connect to Redis when a URL is given, otherwise fall back to memory
    /// with `ttl` as its expiry.
    pub async fn connect(redis_url: Option<&str>, ttl: Duration) -> CacheResult<Self> {
        // ---
        match redis_url {
            Some(url) => Ok(Self::Redis(RedisCache::connect(url).await?)),
            None => Ok(Self::Memory(MemoryCache::new(ttl))),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }

    /// `Ok(None)` on a miss or an expired key.
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            Self::Redis(c) => c.get(key).await,
            Self::Memory(c) => Ok(c.get(key).await),
        }
    }

    /// Store `value` under `key`, expiring after `ttl` (Redis) or the cache's
    /// own TTL (memory).
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match self {
            Self::Redis(c) => c.set(key, value, ttl).await,
            Self::Memory(c) => {
                c.set(key, value).await;
                Ok(())
            }
        }
    }
}

impl From<MemoryCache> for CacheStore {
    fn from(cache: MemoryCache) -> Self {
        Self::Memory(cache)
    }
}

// ---

/// Redis-backed cache using a multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisCache {
    connection_manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> CacheResult<Self> {
        // ---
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        debug!("Redis cache connected");
        Ok(Self { connection_manager })
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        // ---
        let mut conn = self.connection_manager.clone();
        let result: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        if result.is_some() {
            debug!(key = key, "Cache HIT");
        } else {
            debug!(key = key, "Cache MISS");
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        // ---
        let mut conn = self.connection_manager.clone();
        let ttl_seconds = ttl.as_secs().max(1);

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        debug!(key = key, ttl_seconds = ttl_seconds, "Cache SET");
        Ok(())
    }
}

// ---

/// Longest TTL the in-process cache accepts; longer values are clamped.
pub const MAX_MEMORY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Upper bound on entries; the service only ever caches one box.
const MEMORY_CAPACITY: u64 = 1_000;

/// In-process cache on Moka.
///
/// Not shared between processes. All entries share the TTL given at
/// construction; the per-call TTL on `CacheStore::set` only reaches Redis.
#[derive(Clone)]
pub struct MemoryCache {
    cache: moka::future::Cache<String, String>,
    ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        // ---
        let ttl = ttl.min(MAX_MEMORY_TTL);
        let cache = moka::future::Cache::builder()
            .max_capacity(MEMORY_CAPACITY)
            .time_to_live(ttl)
            .build();

        debug!(ttl_seconds = ttl.as_secs(), "In-process cache created");
        Self { cache, ttl }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        // ---
        let result = self.cache.get(key).await;

        if result.is_some() {
            debug!(key = key, "Cache HIT (memory)");
        } else {
            debug!(key = key, "Cache MISS (memory)");
        }
        result
    }

    pub async fn set(&self, key: &str, value: &str) {
        // ---
        self.cache.insert(key.to_string(), value.to_string()).await;
        debug!(key = key, ttl_seconds = self.ttl.as_secs(), "Cache SET (memory)");
    }
}
