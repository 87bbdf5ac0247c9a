//! Fail injection for cache stores.
//!
//! [`FailingCacheStore`] wraps a real store and rejects the operations it
//! is told to, with [`CacheStoreError::Unavailable`]. Operations that are
//! not failing are forwarded untouched, so a test can break only the write
//! path and still inspect the lock key through `exists`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::cache::{CacheStore, CacheStoreError, ScanPage, SetCondition};

/// A cache store primitive that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Get,
    /// Unconditional writes (`SETEX`).
    Set,
    /// Conditional writes (`SET NX EX`), i.e. lock acquisition.
    SetIfAbsent,
    Exists,
    Scan,
    Unlink,
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Set => "SETEX",
            Self::SetIfAbsent => "SET NX",
            Self::Exists => "EXISTS",
            Self::Scan => "SCAN",
            Self::Unlink => "UNLINK",
        };
        write!(formatter, "{name}")
    }
}

/// Cache store decorator that rejects selected operations.
///
/// Clones share the same failure set, so failures can be switched on and
/// off while a cache built over the store is in use.
#[derive(Clone)]
pub struct FailingCacheStore {
    inner: Arc<dyn CacheStore>,
    failing: Arc<RwLock<HashSet<StoreOperation>>>,
}

impl std::fmt::Debug for FailingCacheStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FailingCacheStore")
            .field("failing", &*self.failing.read())
            .finish_non_exhaustive()
    }
}

impl FailingCacheStore {
    /// Wraps `inner` with no failures enabled.
    #[must_use]
    pub fn new(inner: Arc<dyn CacheStore>) -> Self {
        Self {
            inner,
            failing: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Builder form of [`FailingCacheStore::fail`].
    #[must_use]
    pub fn failing(self, operation: StoreOperation) -> Self {
        self.fail(operation);
        self
    }

    /// Makes every call of `operation` fail from now on.
    pub fn fail(&self, operation: StoreOperation) {
        self.failing.write().insert(operation);
    }

    /// Restores `operation`.
    pub fn recover(&self, operation: StoreOperation) {
        self.failing.write().remove(&operation);
    }

    /// Makes every operation fail, as during a full outage.
    pub fn fail_all(&self) {
        let mut failing = self.failing.write();
        for operation in [
            StoreOperation::Get,
            StoreOperation::Set,
            StoreOperation::SetIfAbsent,
            StoreOperation::Exists,
            StoreOperation::Scan,
            StoreOperation::Unlink,
        ] {
            failing.insert(operation);
        }
    }

    fn check(&self, operation: StoreOperation) -> Result<(), CacheStoreError> {
        if self.failing.read().contains(&operation) {
            Err(CacheStoreError::Unavailable(format!(
                "{operation} rejected by fail injection"
            )))
        } else {
            Ok(())
        }
    }
}

impl CacheStore for FailingCacheStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CacheStoreError>> {
        Box::pin(async move {
            self.check(StoreOperation::Get)?;
            self.inner.get(key).await
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
            let operation = match condition {
                SetCondition::Always => StoreOperation::Set,
                SetCondition::IfAbsent => StoreOperation::SetIfAbsent,
            };
            self.check(operation)?;
            self.inner.set(key, value, ttl, condition).await
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<u64, CacheStoreError>> {
        Box::pin(async move {
            self.check(StoreOperation::Exists)?;
            self.inner.exists(key).await
        })
    }

    fn scan<'a>(
        &'a self,
        cursor: u64,
        pattern: &'a str,
        batch_size: usize,
    ) -> BoxFuture<'a, Result<ScanPage, CacheStoreError>> {
        Box::pin(async move {
            self.check(StoreOperation::Scan)?;
            self.inner.scan(cursor, pattern, batch_size).await
        })
    }

    fn unlink<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<u64, CacheStoreError>> {
        Box::pin(async move {
            self.check(StoreOperation::Unlink)?;
            self.inner.unlink(keys).await
        })
    }
}
