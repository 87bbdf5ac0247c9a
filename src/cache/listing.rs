//! Read-through cache for task listings.
//!
//! # Protocol
//!
//! 1. `GET` the listing key; a decodable value is a hit.
//! 2. On a miss, try to take the rebuild lock.
//!    - Taken: report a miss. The caller rebuilds and calls
//!      [`ListingCache::set_cached`], which also releases the lock.
//!    - Held elsewhere: wait for release, then re-read the key once.
//! 3. Anything else (store down, corrupt payload, wait exhausted) is a
//!    miss. A cache outage never fails a request, it only makes it slower.
//!
//! Slot lifecycle per `(user, filter)`:
//!
//! ```text
//! EMPTY --miss, lock taken--> REBUILDING --set_cached--> POPULATED
//! EMPTY --miss, lock held--> WAITING --released, value present--> POPULATED
//! EMPTY --miss, lock held, wait exhausted--> EMPTY
//! POPULATED --TTL expiry | invalidation--> EMPTY
//! ```

use std::sync::Arc;

use thiserror::Error;

use super::codec::{self, CodecError};
use super::keys;
use super::lock::ListingLock;
use super::store::{CacheStore, CacheStoreError, SetCondition};
use crate::config::CacheConfig;
use crate::domain::{TaskFilter, TaskListing, UserId};

// =============================================================================
// Errors
// =============================================================================

/// Failures inside the cache layer. Never returned to callers of
/// [`ListingCache`]; they are logged and turned into misses or no-ops.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] CacheStoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

// =============================================================================
// Lookup Outcome
// =============================================================================

/// How a lookup ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingLookup {
    /// The listing was cached (possibly after waiting for a rebuild).
    Hit(TaskListing),
    /// This caller holds the rebuild lock and is expected to call
    /// `set_cached`.
    LockAcquired,
    /// Another rebuild finished but left no value behind.
    ReleasedWithoutValue,
    /// Another rebuild was still running when the wait budget ran out.
    WaitExhausted,
    /// Caching is disabled by configuration.
    Bypassed,
    /// The store or the codec failed.
    Failed,
}

impl ListingLookup {
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// The cached listing, if the lookup was a hit.
    #[must_use]
    pub fn into_listing(self) -> Option<TaskListing> {
        match self {
            Self::Hit(listing) => Some(listing),
            _ => None,
        }
    }
}

impl std::fmt::Display for ListingLookup {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit(_) => write!(formatter, "HIT"),
            Self::LockAcquired => write!(formatter, "MISS_LOCK_ACQUIRED"),
            Self::ReleasedWithoutValue => write!(formatter, "MISS_RELEASED"),
            Self::WaitExhausted => write!(formatter, "MISS_WAIT_EXHAUSTED"),
            Self::Bypassed => write!(formatter, "BYPASS"),
            Self::Failed => write!(formatter, "ERROR"),
        }
    }
}

// =============================================================================
// Listing Cache
// =============================================================================

/// Stampede-protected read-through cache of task listings.
///
/// Stateless apart from its configuration; all shared state lives in the
/// injected store.
#[derive(Clone)]
pub struct ListingCache {
    store: Arc<dyn CacheStore>,
    lock: ListingLock,
    config: CacheConfig,
}

impl std::fmt::Debug for ListingCache {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ListingCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ListingCache {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        let lock = ListingLock::new(store.clone(), config.lock_retry_delay);
        Self {
            store,
            lock,
            config,
        }
    }

    /// Returns the cached listing, or `None` when the caller should fetch
    /// from the primary store.
    pub async fn get_cached(&self, user_id: &UserId, filter: &TaskFilter) -> Option<TaskListing> {
        self.lookup(user_id, filter).await.into_listing()
    }

    /// Like [`ListingCache::get_cached`], reporting which path was taken.
    pub async fn lookup(&self, user_id: &UserId, filter: &TaskFilter) -> ListingLookup {
        if !self.config.enabled {
            return ListingLookup::Bypassed;
        }

        match self.try_lookup(user_id, filter).await {
            Ok(outcome) => {
                tracing::debug!(user_id = %user_id, outcome = %outcome, "Listing cache lookup");
                outcome
            }
            Err(error) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %error,
                    "Listing cache lookup failed, falling back to primary storage"
                );
                ListingLookup::Failed
            }
        }
    }

    async fn try_lookup(
        &self,
        user_id: &UserId,
        filter: &TaskFilter,
    ) -> Result<ListingLookup, CacheError> {
        let listing_key = keys::listing_key(user_id, filter);
        let lock_key = keys::lock_key(user_id, filter);

        if let Some(listing) = self.read(&listing_key).await? {
            return Ok(ListingLookup::Hit(listing));
        }

        if self.lock.acquire(&lock_key, self.config.lock_ttl).await {
            return Ok(ListingLookup::LockAcquired);
        }

        if !self
            .lock
            .wait_for_release(&lock_key, self.config.lock_max_retries)
            .await
        {
            return Ok(ListingLookup::WaitExhausted);
        }

        Ok(self
            .read(&listing_key)
            .await?
            .map_or(ListingLookup::ReleasedWithoutValue, ListingLookup::Hit))
    }

    async fn read(&self, listing_key: &str) -> Result<Option<TaskListing>, CacheError> {
        match self.store.get(listing_key).await? {
            Some(text) => Ok(Some(codec::decode(&text)?)),
            None => Ok(None),
        }
    }

    /// Stores `listing` and releases the rebuild lock.
    ///
    /// The lock is released even when the write fails, so a failed rebuild
    /// does not hold the slot until the lock expires. Never fails.
    pub async fn set_cached(&self, user_id: &UserId, listing: &TaskListing, filter: &TaskFilter) {
        if !self.config.enabled {
            return;
        }

        let listing_key = keys::listing_key(user_id, filter);
        let lock_key = keys::lock_key(user_id, filter);

        if let Err(error) = self.write(&listing_key, listing).await {
            tracing::warn!(
                user_id = %user_id,
                key = %listing_key,
                error = %error,
                "Failed to populate listing cache"
            );
        }

        self.lock.release(&lock_key).await;
    }

    /// Releases the rebuild lock without storing anything, for a caller
    /// that took the lock but could not load the listing.
    pub async fn abandon_rebuild(&self, user_id: &UserId, filter: &TaskFilter) {
        if !self.config.enabled {
            return;
        }
        self.lock.release(&keys::lock_key(user_id, filter)).await;
    }

    async fn write(&self, listing_key: &str, listing: &TaskListing) -> Result<(), CacheError> {
        let text = codec::encode(listing)?;
        self.store
            .set(listing_key, &text, self.config.listing_ttl, SetCondition::Always)
            .await?;
        Ok(())
    }
}
