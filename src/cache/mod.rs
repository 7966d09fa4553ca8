//! Redis-backed cache facade and the cache-aside read path.
//!
//! The facade is safe to use when Redis is unreachable: every operation
//! returns an error instead of failing the process, and `read_through`
//! treats any read error as a miss. Values are JSON-encoded; each data
//! class carries its own TTL tier below.

pub mod keys;

use std::future::Future;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RedisConfig;

/// TTL tiers by data volatility.
pub const TTL_LIVE_VEHICLES: Duration = Duration::from_secs(10);
pub const TTL_TRIP_UPDATES: Duration = Duration::from_secs(10);
pub const TTL_ALERTS: Duration = Duration::from_secs(60);
pub const TTL_ROUTE_LIST: Duration = Duration::from_secs(24 * 60 * 60);
pub const TTL_ROUTE_TRIPS: Duration = Duration::from_secs(12 * 60 * 60);
pub const TTL_ROUTE_STOPS: Duration = Duration::from_secs(12 * 60 * 60);
pub const TTL_CONNECTIVITY: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store was never reached at startup; callers may bypass
    /// caching entirely.
    #[error("cache backend not initialized")]
    Unavailable,
    /// The key is absent (or expired). Distinct from `Backend` so
    /// diagnostics can tell backend-down from key-absent.
    #[error("key not found")]
    Miss,
    #[error("redis error: {0}")]
    Backend(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal key-value contract the cache-aside path needs. Implemented by
/// [`Cache`] over Redis; tests substitute an in-memory store.
pub trait KeyValueStore {
    fn get_raw(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, CacheError>> + Send;
    fn set_raw(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), CacheError>> + Send;
    fn health(&self) -> impl Future<Output = Result<(), CacheError>> + Send;
}

/// Typed get/set over any [`KeyValueStore`], JSON-encoded.
pub trait KeyValueStoreExt: KeyValueStore {
    fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<T, CacheError>> + Send
    where
        Self: Sync,
    {
        async move {
            match self.get_raw(key).await? {
                Some(payload) => Ok(serde_json::from_str(&payload)?),
                None => Err(CacheError::Miss),
            }
        }
    }

    fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send
    where
        Self: Sync,
    {
        async move {
            let payload = serde_json::to_string(value)?;
            self.set_raw(key, payload, ttl).await
        }
    }
}

impl<S: KeyValueStore> KeyValueStoreExt for S {}

/// Cache-aside: return the cached value on a hit; on a miss (or any cache
/// error) invoke `fetch`, best-effort store the result with `ttl`, and
/// return it. A failed store only forfeits the next request's shortcut.
pub async fn read_through<S, T, E, F, Fut>(
    store: &S,
    key: &str,
    ttl: Duration,
    fetch: F,
) -> Result<T, E>
where
    S: KeyValueStore + Sync,
    T: Serialize + DeserializeOwned + Sync,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match store.get::<T>(key).await {
        Ok(value) => {
            debug!(key, "cache hit");
            return Ok(value);
        }
        Err(CacheError::Miss) => debug!(key, "cache miss"),
        Err(e) => debug!(key, error = %e, "cache read failed, treating as miss"),
    }

    let value = fetch().await?;

    if let Err(e) = store.set(key, &value, ttl).await {
        warn!(key, error = %e, "cache write failed");
    }

    Ok(value)
}

/// Redis-backed implementation of the facade.
#[derive(Clone)]
pub struct Cache {
    conn: Option<ConnectionManager>,
}

impl Cache {
    /// Connect to Redis and verify with a ping. On any failure the facade
    /// comes up disconnected and the process continues without caching,
    /// mirroring a cold cache.
    pub async fn connect(config: &RedisConfig) -> Self {
        match Self::try_connect(config).await {
            Ok(cache) => {
                info!(host = %config.host, port = config.port, db = config.db, "Connected to Redis");
                cache
            }
            Err(e) => {
                warn!(error = %e, "Redis connection failed, continuing without caching");
                Self::disconnected()
            }
        }
    }

    pub fn disconnected() -> Self {
        Self { conn: None }
    }

    async fn try_connect(config: &RedisConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.url())?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn connection(&self) -> Result<ConnectionManager, CacheError> {
        self.conn.clone().ok_or(CacheError::Unavailable)
    }
}

impl KeyValueStore for Cache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection()?;
        Ok(conn.get(key).await?)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn health(&self) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that records how many reads and writes it served.
    #[derive(Default)]
    struct RecordingStore {
        entries: Mutex<HashMap<String, String>>,
        gets: AtomicUsize,
        sets: AtomicUsize,
    }

    impl KeyValueStore for RecordingStore {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set_raw(
            &self,
            key: &str,
            value: String,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.entries.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn health(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    /// Store whose every operation fails, as when Redis is down.
    struct DownStore;

    impl KeyValueStore for DownStore {
        async fn get_raw(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable)
        }

        async fn set_raw(
            &self,
            _key: &str,
            _value: String,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable)
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable)
        }

        async fn health(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable)
        }
    }

    #[tokio::test]
    async fn first_read_fetches_and_stores_once() {
        let store = RecordingStore::default();
        let fetches = AtomicUsize::new(0);

        let value: Vec<String> = read_through(&store, "live:Red", TTL_LIVE_VEHICLES, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(vec!["vehicle-1".to_string()])
        })
        .await
        .unwrap();

        assert_eq!(value, vec!["vehicle-1"]);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.sets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_read_within_ttl_skips_upstream() {
        let store = RecordingStore::default();
        let fetches = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: Vec<String> = read_through(&store, "live:Red", TTL_LIVE_VEHICLES, || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(vec!["vehicle-1".to_string()])
            })
            .await
            .unwrap();
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.sets.load(Ordering::SeqCst), 1);
        assert_eq!(store.gets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_share_entries() {
        let store = RecordingStore::default();
        let fetches = AtomicUsize::new(0);

        for key in ["live:Red", "live:Blue"] {
            let _: Vec<String> = read_through(&store, key, TTL_LIVE_VEHICLES, || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(vec![key.to_string()])
            })
            .await
            .unwrap();
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreachable_store_still_returns_fresh_value() {
        let fetches = AtomicUsize::new(0);

        let value: u32 = read_through(&DownStore, "routes:all", TTL_ROUTE_LIST, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(7)
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // Every request pays the upstream cost, but none fail.
        let value: u32 = read_through(&DownStore, "routes:all", TTL_ROUTE_LIST, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_error_propagates_and_stores_nothing() {
        let store = RecordingStore::default();

        let result: Result<u32, CacheError> =
            read_through(&store, "alerts:all", TTL_ALERTS, || async {
                Err(CacheError::Miss)
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_entry_is_treated_as_miss() {
        let store = RecordingStore::default();
        store
            .entries
            .lock()
            .unwrap()
            .insert("routes:all".to_string(), "not json".to_string());

        let value: u32 = read_through(&store, "routes:all", TTL_ROUTE_LIST, || async {
            Ok::<_, CacheError>(42)
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        // The bad entry was overwritten with the fresh value.
        assert_eq!(
            store.entries.lock().unwrap().get("routes:all").unwrap(),
            "42"
        );
    }

    #[tokio::test]
    async fn typed_get_distinguishes_miss() {
        let store = RecordingStore::default();
        let err = store.get::<u32>("absent").await.unwrap_err();
        assert!(matches!(err, CacheError::Miss));

        store.set("present", &5u32, TTL_ALERTS).await.unwrap();
        assert_eq!(store.get::<u32>("present").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn disconnected_facade_errors_instead_of_panicking() {
        let cache = Cache::disconnected();
        assert!(matches!(
            cache.get_raw("k").await.unwrap_err(),
            CacheError::Unavailable
        ));
        assert!(matches!(
            cache
                .set_raw("k", "v".into(), TTL_ALERTS)
                .await
                .unwrap_err(),
            CacheError::Unavailable
        ));
        assert!(matches!(
            cache.delete("k").await.unwrap_err(),
            CacheError::Unavailable
        ));
        assert!(matches!(
            cache.health().await.unwrap_err(),
            CacheError::Unavailable
        ));
    }
}
