//! Redis implementation of the cache store.
//!
//! Uses `deadpool-redis` for connection pooling. Each primitive maps onto a
//! single Redis command, so the atomicity the listing cache relies on is
//! Redis' own:
//!
//! - `get` -> `GET`
//! - `set` -> `SETEX`, or `SET key value NX EX ttl` for [`SetCondition::IfAbsent`]
//! - `exists` -> `EXISTS`
//! - `scan` -> `SCAN cursor MATCH pattern COUNT batch`
//! - `unlink` -> `UNLINK` (memory is reclaimed off the main thread)

use std::time::Duration;

use deadpool_redis::{Config, Connection, Pool, Runtime};
use futures::future::BoxFuture;
use redis::AsyncCommands;

use crate::cache::store::expiry_seconds;
use crate::cache::{CacheStore, CacheStoreError, ScanPage, SetCondition};
use crate::config::RedisConfig;

fn command_error(error: &redis::RedisError) -> CacheStoreError {
    CacheStoreError::Command(error.to_string())
}

/// Redis-backed [`CacheStore`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use task_tracker::config::{CacheConfig, RedisConfig};
/// use task_tracker::infrastructure::RedisCacheStore;
/// use task_tracker::cache::ListingCache;
///
/// let store = RedisCacheStore::from_config(&RedisConfig::with_url("redis://localhost:6379"))?;
/// let cache = ListingCache::new(Arc::new(store), CacheConfig::default());
/// ```
#[derive(Debug, Clone)]
pub struct RedisCacheStore {
    pool: Pool,
}

impl RedisCacheStore {
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Creates a pool for `config.url`. No connection is opened yet.
    ///
    /// # Errors
    ///
    /// Returns `CacheStoreError::Connection` if the pool cannot be created.
    pub fn from_config(config: &RedisConfig) -> Result<Self, CacheStoreError> {
        let pool = Config::from_url(&config.url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|error| CacheStoreError::Connection(error.to_string()))?;
        Ok(Self { pool })
    }

    async fn connection(&self) -> Result<Connection, CacheStoreError> {
        self.pool
            .get()
            .await
            .map_err(|error| CacheStoreError::Connection(error.to_string()))
    }
}

#[allow(clippy::significant_drop_tightening)]
impl CacheStore for RedisCacheStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CacheStoreError>> {
        Box::pin(async move {
            let mut connection = self.connection().await?;
            let value: Option<String> = connection
                .get(key)
                .await
                .map_err(|error| command_error(&error))?;
            Ok(value)
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
        condition: SetCondition,
    ) -> BoxFuture<'a, Result<bool, CacheStoreError>> {
        Box::pin(async move {
            let mut connection = self.connection().await?;
            let seconds = expiry_seconds(ttl);

            match condition {
                SetCondition::Always => {
                    let () = connection
                        .set_ex(key, value, seconds)
                        .await
                        .map_err(|error| command_error(&error))?;
                    Ok(true)
                }
                SetCondition::IfAbsent => {
                    // Nil reply when the key already exists.
                    let reply: Option<String> = redis::cmd("SET")
                        .arg(key)
                        .arg(value)
                        .arg("NX")
                        .arg("EX")
                        .arg(seconds)
                        .query_async(&mut *connection)
                        .await
                        .map_err(|error| command_error(&error))?;
                    Ok(reply.is_some_and(|status| status == "OK"))
                }
            }
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<u64, CacheStoreError>> {
        Box::pin(async move {
            let mut connection = self.connection().await?;
            let count: u64 = connection
                .exists(key)
                .await
                .map_err(|error| command_error(&error))?;
            Ok(count)
        })
    }

    fn scan<'a>(
        &'a self,
        cursor: u64,
        pattern: &'a str,
        batch_size: usize,
    ) -> BoxFuture<'a, Result<ScanPage, CacheStoreError>> {
        Box::pin(async move {
            let mut connection = self.connection().await?;
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(batch_size)
                .query_async(&mut *connection)
                .await
                .map_err(|error| command_error(&error))?;
            Ok(ScanPage::new(next_cursor, keys))
        })
    }

    fn unlink<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<u64, CacheStoreError>> {
        Box::pin(async move {
            if keys.is_empty() {
                return Ok(0);
            }
            let mut connection = self.connection().await?;
            let removed: u64 = connection
                .unlink(keys)
                .await
                .map_err(|error| command_error(&error))?;
            Ok(removed)
        })
    }
}
