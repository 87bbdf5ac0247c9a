//! Invalidation of a user's cached listings.
//!
//! A mutation can change any filtered view of a user's tasks, so every
//! listing and lock key of that user is removed. Keys are found with a
//! cursor-based `SCAN` over the user's pattern rather than by enumerating
//! filters, and each batch is removed with `UNLINK`.

use std::sync::Arc;

use super::keys;
use super::store::{CacheStore, CacheStoreError};
use crate::config::CacheConfig;
use crate::domain::UserId;

/// Removes all cached listings and rebuild locks of a user.
#[derive(Clone)]
pub struct CacheInvalidator {
    store: Arc<dyn CacheStore>,
    batch_size: usize,
}

impl std::fmt::Debug for CacheInvalidator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CacheInvalidator")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl CacheInvalidator {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            batch_size: config.scan_batch_size.max(1),
        }
    }

    /// Deletes every listing key, then every lock key, of `user_id`.
    ///
    /// Runs regardless of whether caching is enabled. Never fails: errors
    /// are logged and the TTL bounds how long a missed entry stays stale.
    pub async fn invalidate_all(&self, user_id: &UserId) {
        for pattern in [keys::listing_pattern(user_id), keys::lock_pattern(user_id)] {
            match self.sweep(&pattern).await {
                Ok(removed) => {
                    tracing::debug!(user_id = %user_id, pattern = %pattern, removed, "Invalidated cache keys");
                }
                Err(error) => {
                    tracing::warn!(
                        user_id = %user_id,
                        pattern = %pattern,
                        error = %error,
                        "Failed to invalidate cache keys"
                    );
                }
            }
        }
    }

    /// Scans `pattern` to completion, unlinking each non-empty batch.
    async fn sweep(&self, pattern: &str) -> Result<u64, CacheStoreError> {
        let mut cursor = 0;
        let mut removed = 0;

        loop {
            let page = self.store.scan(cursor, pattern, self.batch_size).await?;
            if !page.keys.is_empty() {
                removed += self.store.unlink(&page.keys).await?;
            }
            if page.is_last() {
                return Ok(removed);
            }
            cursor = page.cursor;
        }
    }
}
