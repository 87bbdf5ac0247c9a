//! Integration tests for per-user cache invalidation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use common::{date, in_memory_store, init_tracing, listing_of, task};
use task_tracker::cache::{
    CacheInvalidator, CacheStore, ListingCache, SetCondition, listing_key, lock_key,
};
use task_tracker::config::CacheConfig;
use task_tracker::domain::{TaskFilter, TaskStatus, UserId};
use task_tracker::infrastructure::{FailingCacheStore, InMemoryCacheStore, StoreOperation};

const TTL: Duration = Duration::from_secs(60);

/// Populates a listing and leaves its lock held, for each filter.
async fn populate(store: &Arc<InMemoryCacheStore>, user_id: &UserId, filters: &[TaskFilter]) {
    for filter in filters {
        store
            .set(&listing_key(user_id, filter), "{\"tasks\":[]}", TTL, SetCondition::Always)
            .await
            .unwrap();
        store
            .set(&lock_key(user_id, filter), "1", TTL, SetCondition::IfAbsent)
            .await
            .unwrap();
    }
}

fn two_filters() -> [TaskFilter; 2] {
    [
        TaskFilter::all().with_status(TaskStatus::Pending),
        TaskFilter::all().with_due_date(date("2024-03-01")),
    ]
}

#[rstest]
#[case(100)]
#[case(1)]
#[tokio::test]
async fn test_removes_all_keys_of_user_only(#[case] batch_size: usize) {
    init_tracing();
    let store = in_memory_store();
    let owner = UserId::new("U");
    let other = UserId::new("V");
    populate(&store, &owner, &two_filters()).await;
    populate(&store, &other, &two_filters()).await;
    assert_eq!(store.len(), 8);

    let invalidator = CacheInvalidator::new(
        store.clone(),
        &CacheConfig::default().with_scan_batch_size(batch_size),
    );
    invalidator.invalidate_all(&owner).await;

    let remaining = store.keys();
    assert_eq!(remaining.len(), 4);
    for filter in two_filters() {
        assert!(!remaining.contains(&listing_key(&owner, &filter)));
        assert!(!remaining.contains(&lock_key(&owner, &filter)));
        assert!(remaining.contains(&listing_key(&other, &filter)));
        assert!(remaining.contains(&lock_key(&other, &filter)));
    }
}

#[rstest]
#[case("U", "U2")]
#[case("a*", "ab")]
#[case("a?", "ab")]
#[case("[ab]", "a")]
#[case("a", "a:status:all")]
#[tokio::test]
async fn test_lookalike_users_are_untouched(#[case] owner: &str, #[case] other: &str) {
    let store = in_memory_store();
    let owner = UserId::new(owner);
    let other = UserId::new(other);
    populate(&store, &owner, &[TaskFilter::all()]).await;
    populate(&store, &other, &[TaskFilter::all()]).await;

    CacheInvalidator::new(store.clone(), &CacheConfig::default())
        .invalidate_all(&owner)
        .await;

    let mut expected = vec![
        listing_key(&other, &TaskFilter::all()),
        lock_key(&other, &TaskFilter::all()),
    ];
    expected.sort();
    assert_eq!(store.keys(), expected);
}

#[rstest]
#[tokio::test]
async fn test_runs_when_caching_is_disabled() {
    let store = in_memory_store();
    let user_id = UserId::new("U");
    populate(&store, &user_id, &two_filters()).await;

    CacheInvalidator::new(store.clone(), &CacheConfig::disabled())
        .invalidate_all(&user_id)
        .await;

    assert!(store.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_invalidated_listing_is_rebuilt() {
    let store = in_memory_store();
    let config = CacheConfig::default();
    let cache = ListingCache::new(store.clone(), config.clone());
    let user_id = UserId::new("U");
    let filter = TaskFilter::all();
    let listing = listing_of(&[task(&user_id, "A", TaskStatus::Pending, "2024-03-01", 0)]);

    cache.set_cached(&user_id, &listing, &filter).await;
    CacheInvalidator::new(store.clone(), &config)
        .invalidate_all(&user_id)
        .await;

    assert_eq!(cache.get_cached(&user_id, &filter).await, None);
    cache.set_cached(&user_id, &listing, &filter).await;
    assert_eq!(cache.get_cached(&user_id, &filter).await, Some(listing));
}

#[rstest]
#[tokio::test]
async fn test_scan_failure_is_swallowed() {
    init_tracing();
    let inner = in_memory_store();
    let user_id = UserId::new("U");
    populate(&inner, &user_id, &two_filters()).await;

    let store = FailingCacheStore::new(inner.clone()).failing(StoreOperation::Scan);
    CacheInvalidator::new(Arc::new(store), &CacheConfig::default())
        .invalidate_all(&user_id)
        .await;

    assert_eq!(inner.len(), 4);
}

#[rstest]
#[tokio::test]
async fn test_unlink_failure_is_swallowed() {
    let inner = in_memory_store();
    let user_id = UserId::new("U");
    populate(&inner, &user_id, &two_filters()).await;

    let store = FailingCacheStore::new(inner.clone()).failing(StoreOperation::Unlink);
    CacheInvalidator::new(Arc::new(store), &CacheConfig::default())
        .invalidate_all(&user_id)
        .await;

    assert_eq!(inner.len(), 4);
}
