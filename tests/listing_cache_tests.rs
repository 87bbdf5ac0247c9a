//! Integration tests for the read-through listing cache.
//!
//! All tests run against `InMemoryCacheStore`, optionally wrapped in
//! `FailingCacheStore`, so they need no external services.
//!
//! # Test Coverage
//!
//! - Hits return the stored listing
//! - Lock handoff between two concurrent lookups
//! - Waiting on a held lock: released with and without a value, exhausted
//! - The lock is released even when populating the cache fails
//! - Store and payload failures degrade to misses and no-ops
//! - A write for a user empties that user's cached `pending` listing

mod common;

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use common::{in_memory_store, init_tracing, listing_of, quick_config, task};
use task_tracker::cache::{
    CacheInvalidator, CacheStore, ListingCache, ListingLookup, SetCondition, listing_key, lock_key,
};
use task_tracker::config::CacheConfig;
use task_tracker::domain::{TaskFilter, TaskListing, TaskStatus, UserId};
use task_tracker::infrastructure::{FailingCacheStore, StoreOperation};

fn sample_listing(user_id: &UserId) -> TaskListing {
    listing_of(&[
        task(user_id, "newer", TaskStatus::Pending, "2024-03-01", 2),
        task(user_id, "older", TaskStatus::Completed, "2024-03-02", 1),
    ])
}

// =============================================================================
// Hits and Lock Handoff
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_stored_listing_is_a_hit() {
    init_tracing();
    let cache = ListingCache::new(in_memory_store(), CacheConfig::default());
    let user_id = UserId::new("u1");
    let filter = TaskFilter::all().with_status(TaskStatus::Pending);
    let listing = sample_listing(&user_id);

    cache.set_cached(&user_id, &listing, &filter).await;

    assert_eq!(
        cache.lookup(&user_id, &filter).await,
        ListingLookup::Hit(listing.clone())
    );
    assert_eq!(cache.get_cached(&user_id, &filter).await, Some(listing));
}

#[rstest]
#[tokio::test]
async fn test_hit_is_scoped_to_filter() {
    let store = in_memory_store();
    let cache = ListingCache::new(store.clone(), CacheConfig::default());
    let user_id = UserId::new("u1");
    let pending = TaskFilter::all().with_status(TaskStatus::Pending);

    cache
        .set_cached(&user_id, &sample_listing(&user_id), &pending)
        .await;

    let completed = TaskFilter::all().with_status(TaskStatus::Completed);
    assert_eq!(
        cache.lookup(&user_id, &completed).await,
        ListingLookup::LockAcquired
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_concurrent_lookups_hand_off_through_lock() {
    init_tracing();
    let store = in_memory_store();
    let cache = ListingCache::new(store.clone(), CacheConfig::default());
    let user_id = UserId::new("u1");
    let filter = TaskFilter::all();
    let listing = sample_listing(&user_id);

    let spawn_lookup = || {
        let cache = cache.clone();
        let user_id = user_id.clone();
        tokio::spawn(async move { cache.lookup(&user_id, &filter).await })
    };
    let first = spawn_lookup();
    let second = spawn_lookup();

    let lock = lock_key(&user_id, &filter);
    while store.exists(&lock).await.unwrap() == 0 {
        tokio::task::yield_now().await;
    }
    cache.set_cached(&user_id, &listing, &filter).await;

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let acquired = outcomes
        .iter()
        .filter(|outcome| **outcome == ListingLookup::LockAcquired)
        .count();
    let hits = outcomes
        .iter()
        .filter(|outcome| **outcome == ListingLookup::Hit(listing.clone()))
        .count();

    assert_eq!(acquired, 1);
    assert_eq!(hits, 1);
    assert_eq!(store.exists(&lock).await.unwrap(), 0);
}

// =============================================================================
// Waiting on a Held Lock
// =============================================================================

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_wait_exhausted_is_a_miss() {
    let store = in_memory_store();
    let cache = ListingCache::new(store.clone(), quick_config(3));
    let user_id = UserId::new("u1");
    let filter = TaskFilter::all();

    let held = store
        .set(
            &lock_key(&user_id, &filter),
            "1",
            Duration::from_secs(30),
            SetCondition::IfAbsent,
        )
        .await
        .unwrap();
    assert!(held);

    let started = tokio::time::Instant::now();
    assert_eq!(
        cache.lookup(&user_id, &filter).await,
        ListingLookup::WaitExhausted
    );
    // 100ms * (1 + 2 + 3)
    assert_eq!(started.elapsed(), Duration::from_millis(600));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_release_without_value_is_a_miss() {
    let store = in_memory_store();
    let cache = ListingCache::new(store.clone(), CacheConfig::default());
    let user_id = UserId::new("u1");
    let filter = TaskFilter::all();

    assert_eq!(
        cache.lookup(&user_id, &filter).await,
        ListingLookup::LockAcquired
    );

    let abandoning = {
        let cache = cache.clone();
        let user_id = user_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            cache.abandon_rebuild(&user_id, &filter).await;
        })
    };

    assert_eq!(
        cache.lookup(&user_id, &filter).await,
        ListingLookup::ReleasedWithoutValue
    );
    abandoning.await.unwrap();
}

// =============================================================================
// Degradation
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_failed_write_still_releases_lock() {
    init_tracing();
    let store = FailingCacheStore::new(in_memory_store()).failing(StoreOperation::Set);
    let cache = ListingCache::new(Arc::new(store.clone()), CacheConfig::default());
    let user_id = UserId::new("u1");
    let filter = TaskFilter::all();

    assert_eq!(
        cache.lookup(&user_id, &filter).await,
        ListingLookup::LockAcquired
    );
    cache
        .set_cached(&user_id, &sample_listing(&user_id), &filter)
        .await;

    assert_eq!(store.exists(&lock_key(&user_id, &filter)).await.unwrap(), 0);
    assert_eq!(store.get(&listing_key(&user_id, &filter)).await.unwrap(), None);
}

#[rstest]
#[tokio::test]
async fn test_read_failure_is_a_miss() {
    let store = FailingCacheStore::new(in_memory_store());
    let cache = ListingCache::new(Arc::new(store.clone()), CacheConfig::default());
    let user_id = UserId::new("u1");
    let filter = TaskFilter::all();
    cache
        .set_cached(&user_id, &sample_listing(&user_id), &filter)
        .await;

    store.fail(StoreOperation::Get);
    assert_eq!(cache.lookup(&user_id, &filter).await, ListingLookup::Failed);
    assert_eq!(cache.get_cached(&user_id, &filter).await, None);

    store.recover(StoreOperation::Get);
    assert!(cache.lookup(&user_id, &filter).await.is_hit());
}

#[rstest]
#[tokio::test]
async fn test_full_outage_never_fails() {
    let store = FailingCacheStore::new(in_memory_store());
    store.fail_all();
    let store: Arc<dyn CacheStore> = Arc::new(store);
    let cache = ListingCache::new(store.clone(), CacheConfig::default());
    let invalidator = CacheInvalidator::new(store, &CacheConfig::default());
    let user_id = UserId::new("u1");
    let filter = TaskFilter::all();

    assert_eq!(cache.get_cached(&user_id, &filter).await, None);
    cache
        .set_cached(&user_id, &sample_listing(&user_id), &filter)
        .await;
    invalidator.invalidate_all(&user_id).await;
}

#[rstest]
#[case("not json")]
#[case(r#"{"tasks":[{"id":"x"}]}"#)]
#[case(r#"{"tasks":[{"id":"018f4c3e-0000-7000-8000-000000000000","description":"d","status":"pending","dueDate":"tomorrow","createdAt":"2024-01-01T00:00:00.000Z"}]}"#)]
#[tokio::test]
async fn test_corrupt_payload_is_a_miss(#[case] payload: &str) {
    let store = in_memory_store();
    let cache = ListingCache::new(store.clone(), CacheConfig::default());
    let user_id = UserId::new("u1");
    let filter = TaskFilter::all();

    store
        .set(
            &listing_key(&user_id, &filter),
            payload,
            Duration::from_secs(60),
            SetCondition::Always,
        )
        .await
        .unwrap();

    assert_eq!(cache.lookup(&user_id, &filter).await, ListingLookup::Failed);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_listing_expires_after_ttl() {
    let store = in_memory_store();
    let cache = ListingCache::new(store.clone(), CacheConfig::default());
    let user_id = UserId::new("u1");
    let filter = TaskFilter::all();

    cache
        .set_cached(&user_id, &sample_listing(&user_id), &filter)
        .await;
    tokio::time::advance(Duration::from_secs(899)).await;
    assert!(cache.lookup(&user_id, &filter).await.is_hit());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(
        cache.lookup(&user_id, &filter).await,
        ListingLookup::LockAcquired
    );
}

// =============================================================================
// Scenario
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_write_empties_pending_listing() {
    init_tracing();
    let store = in_memory_store();
    let config = CacheConfig::default();
    let cache = ListingCache::new(store.clone(), config.clone());
    let invalidator = CacheInvalidator::new(store.clone(), &config);
    let user_id = UserId::new("U");
    let pending = TaskFilter::all().with_status(TaskStatus::Pending);

    let before = listing_of(&[task(&user_id, "A", TaskStatus::Pending, "2024-03-01", 0)]);
    cache.set_cached(&user_id, &before, &pending).await;
    assert_eq!(cache.get_cached(&user_id, &pending).await, Some(before));

    // A task "B" is created in primary storage, then the user's cache is invalidated.
    invalidator.invalidate_all(&user_id).await;

    assert_eq!(cache.get_cached(&user_id, &pending).await, None);
}
