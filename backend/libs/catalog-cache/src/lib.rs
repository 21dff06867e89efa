//! Catalog caching layer
//!
//! Provides the key-value capability used by the product read path:
//! - `KeyValueStore`: raw get/set/del with optional TTL
//! - `RedisStore` and `InMemoryStore` backends
//! - `JsonCache`: typed reads/writes with bounded call time, where an
//!   undeserializable value is reported as a miss rather than an error
//! - Metrics integration

mod error;
mod keys;
mod memory;
mod metrics;

pub use error::{CacheError, CacheResult};
pub use keys::CacheKey;
pub use memory::InMemoryStore;
pub use metrics::CacheMetrics;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use resilience::timeout::{with_timeout_result, TimeoutError};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Shared handle to any key-value backend
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Default bound on a single cache call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(250);

/// Raw key-value operations
///
/// Implementations must be safe for concurrent use from many request tasks.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the raw value stored under `key`
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a raw value; `None` keeps the entry until evicted or deleted
    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a key
    async fn del(&self, key: &str) -> CacheResult<()>;
}

/// Redis-backed store
///
/// `ConnectionManager` is a multiplexed handle; each call works on a clone, so
/// no lock is held while a command is in flight.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis and build a managed connection
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Add jitter to TTL so entries written together do not expire together
    fn add_jitter(ttl_secs: u64) -> u64 {
        let jitter_percent = (rand::random::<u32>() % 10) as f64 / 100.0;
        let jitter = (ttl_secs as f64 * jitter_percent).round() as u64;
        ttl_secs + jitter
    }
}

#[async_trait::async_trait]
impl KeyValueStore for RedisStore {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let secs = Self::add_jitter(ttl.as_secs().max(1));
                conn.set_ex::<_, _, ()>(key, value, secs).await?;
            }
            None => {
                conn.set::<_, _, ()>(key, value).await?;
            }
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// Result of a typed cache read
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    /// Well-formed value found
    Hit(T),
    /// Nothing stored under the key
    Miss,
    /// A value was stored but could not be deserialized
    Malformed,
}

/// Typed JSON cache over any `KeyValueStore`
#[derive(Clone)]
pub struct JsonCache {
    store: SharedStore,
    ttl: Option<Duration>,
    call_timeout: Duration,
    metrics: CacheMetrics,
}

impl JsonCache {
    /// `ttl = None` means entries never expire on their own.
    pub fn new(store: SharedStore, ttl: Option<Duration>) -> Self {
        Self {
            store,
            ttl,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            metrics: CacheMetrics::new(),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    async fn bounded<T, F>(&self, key: &str, op: &str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        match with_timeout_result(self.call_timeout, fut).await {
            Ok(value) => Ok(value),
            Err(TimeoutError::Elapsed(d)) => {
                warn!(key = %key, op, timeout_ms = d.as_millis() as u64, "Cache call timed out");
                self.metrics.record_error(key, "timeout");
                Err(CacheError::Timeout(d))
            }
            Err(TimeoutError::Failed(e)) => {
                warn!(key = %key, op, error = %e, "Cache call failed");
                self.metrics.record_error(key, "backend");
                Err(e)
            }
        }
    }

    /// Read and deserialize a value
    ///
    /// An undeserializable value is deleted (best effort) and reported as
    /// `Malformed`; only backend failures surface as `Err`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<CacheLookup<T>> {
        let raw = self.bounded(key, "get", self.store.get_raw(key)).await?;

        match raw {
            Some(data) => match serde_json::from_str::<T>(&data) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    self.metrics.record_hit(key);
                    Ok(CacheLookup::Hit(value))
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache deserialization failed");
                    self.metrics.record_malformed(key);
                    if let Err(del_err) = self.bounded(key, "del", self.store.del(key)).await {
                        debug!(key = %key, error = %del_err, "Failed to drop malformed entry");
                    }
                    Ok(CacheLookup::Malformed)
                }
            },
            None => {
                debug!(key = %key, "Cache miss");
                self.metrics.record_miss(key);
                Ok(CacheLookup::Miss)
            }
        }
    }

    /// Serialize and store a value with the configured TTL
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) -> CacheResult<()> {
        let data = serde_json::to_string(value)?;
        self.bounded(key, "set", self.store.set_raw(key, data, self.ttl))
            .await?;

        debug!(key = %key, ttl_secs = self.ttl.map(|t| t.as_secs()), "Cache set");
        self.metrics.record_write(key);
        Ok(())
    }

    /// Delete a key
    pub async fn invalidate(&self, key: &str) -> CacheResult<()> {
        self.bounded(key, "del", self.store.del(key)).await?;

        debug!(key = %key, "Cache delete");
        self.metrics.record_invalidation(key);
        Ok(())
    }
}
