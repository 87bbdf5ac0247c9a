//! Rebuild lock on top of the cache store.
//!
//! The lock only reduces duplicate rebuilds; it does not guarantee
//! exclusion. Every store error degrades to "proceed without the lock":
//! a failed acquire reports `false`, a failed release is logged, and a
//! failed existence check counts as released. A lock that is never
//! released disappears when its TTL elapses.

use std::sync::Arc;
use std::time::Duration;

use super::store::{CacheStore, SetCondition};

const LOCK_VALUE: &str = "1";

/// Stampede lock for listing rebuilds.
#[derive(Clone)]
pub struct ListingLock {
    store: Arc<dyn CacheStore>,
    retry_delay: Duration,
}

impl std::fmt::Debug for ListingLock {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ListingLock")
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl ListingLock {
    /// `retry_delay` is the base of the linear backoff used while waiting.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, retry_delay: Duration) -> Self {
        Self { store, retry_delay }
    }

    /// Tries to take the lock with a single atomic set-if-absent.
    ///
    /// Returns `true` only for the caller that created the entry.
    pub async fn acquire(&self, lock_key: &str, ttl: Duration) -> bool {
        match self
            .store
            .set(lock_key, LOCK_VALUE, ttl, SetCondition::IfAbsent)
            .await
        {
            Ok(acquired) => {
                tracing::debug!(key = %lock_key, acquired, "Rebuild lock acquisition");
                acquired
            }
            Err(error) => {
                tracing::warn!(key = %lock_key, error = %error, "Failed to acquire rebuild lock");
                false
            }
        }
    }

    /// Deletes the lock entry if present. Never fails.
    pub async fn release(&self, lock_key: &str) {
        let keys = [lock_key.to_string()];
        if let Err(error) = self.store.unlink(&keys).await {
            tracing::warn!(
                key = %lock_key,
                error = %error,
                "Failed to release rebuild lock, leaving it to expire"
            );
        }
    }

    /// Polls until the lock is gone, for at most `max_attempts` checks.
    ///
    /// After the i-th unsuccessful check (1-based) the caller sleeps
    /// `retry_delay * i`. Returns `true` as soon as the key is observed
    /// absent and `false` once the attempts are exhausted.
    pub async fn wait_for_release(&self, lock_key: &str, max_attempts: u32) -> bool {
        for attempt in 1..=max_attempts {
            match self.store.exists(lock_key).await {
                Ok(0) => return true,
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(
                        key = %lock_key,
                        error = %error,
                        "Failed to check rebuild lock, treating it as released"
                    );
                    return true;
                }
            }
            tokio::time::sleep(self.retry_delay.saturating_mul(attempt)).await;
        }

        tracing::debug!(key = %lock_key, max_attempts, "Rebuild lock still held after waiting");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{FailingCacheStore, InMemoryCacheStore, StoreOperation};
    use rstest::rstest;

    fn lock_over(store: Arc<dyn CacheStore>) -> ListingLock {
        ListingLock::new(store, Duration::from_millis(100))
    }

    #[rstest]
    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let lock = lock_over(Arc::new(InMemoryCacheStore::new()));
        assert!(lock.acquire("lock:a", Duration::from_secs(30)).await);
        assert!(!lock.acquire("lock:a", Duration::from_secs(30)).await);
        assert!(lock.acquire("lock:b", Duration::from_secs(30)).await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_release_allows_reacquire() {
        let lock = lock_over(Arc::new(InMemoryCacheStore::new()));
        assert!(lock.acquire("lock:a", Duration::from_secs(30)).await);
        lock.release("lock:a").await;
        assert!(lock.acquire("lock:a", Duration::from_secs(30)).await);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_lock_expires_after_ttl() {
        let lock = lock_over(Arc::new(InMemoryCacheStore::new()));
        assert!(lock.acquire("lock:a", Duration::from_secs(30)).await);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(lock.acquire("lock:a", Duration::from_secs(30)).await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_wait_for_release_returns_immediately_when_absent() {
        let lock = lock_over(Arc::new(InMemoryCacheStore::new()));
        assert!(lock.wait_for_release("lock:missing", 10).await);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_wait_for_release_uses_linear_backoff() {
        let lock = lock_over(Arc::new(InMemoryCacheStore::new()));
        assert!(lock.acquire("lock:a", Duration::from_secs(60)).await);

        let started = tokio::time::Instant::now();
        assert!(!lock.wait_for_release("lock:a", 10).await);

        // 100ms * (1 + 2 + ... + 10)
        assert_eq!(started.elapsed(), Duration::from_millis(5500));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_wait_for_release_observes_release() {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
        let lock = lock_over(store.clone());
        assert!(lock.acquire("lock:a", Duration::from_secs(60)).await);

        let releaser = {
            let lock = lock.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(250)).await;
                lock.release("lock:a").await;
            })
        };

        assert!(lock.wait_for_release("lock:a", 10).await);
        releaser.await.unwrap();
    }

    #[rstest]
    #[tokio::test]
    async fn test_store_errors_degrade() {
        let store = FailingCacheStore::new(Arc::new(InMemoryCacheStore::new()))
            .failing(StoreOperation::SetIfAbsent)
            .failing(StoreOperation::Exists)
            .failing(StoreOperation::Unlink);
        let lock = lock_over(Arc::new(store));

        assert!(!lock.acquire("lock:a", Duration::from_secs(30)).await);
        lock.release("lock:a").await;
        assert!(lock.wait_for_release("lock:a", 10).await);
    }
}
