//! Common helpers for integration tests.
//!
//! Each integration test file is compiled as its own crate, so helpers
//! used by only some of the files would otherwise warn as dead code.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use tracing_subscriber::EnvFilter;

use task_tracker::config::CacheConfig;
use task_tracker::domain::{Task, TaskId, TaskListing, TaskStatus, Timestamp, UserId};
use task_tracker::infrastructure::InMemoryCacheStore;

/// Routes `tracing` output through the test harness. `RUST_LOG` selects
/// the level; repeated calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

/// A task due at midnight UTC of `due`, created `minute` minutes into 2024.
pub fn task(owner: &UserId, description: &str, status: TaskStatus, due: &str, minute: u32) -> Task {
    let created_at = Utc
        .with_ymd_and_hms(2024, 1, 1, minute / 60, minute % 60, 0)
        .unwrap();
    Task::new(
        TaskId::generate(),
        owner.clone(),
        description,
        Timestamp::from_calendar_date(date(due)),
        Timestamp::from_datetime(created_at),
    )
    .with_status(status)
}

pub fn listing_of(tasks: &[Task]) -> TaskListing {
    tasks.iter().collect()
}

pub fn in_memory_store() -> Arc<InMemoryCacheStore> {
    Arc::new(InMemoryCacheStore::new())
}

/// Default configuration with a short wait budget, for tests that
/// exercise waiting on a held lock.
pub fn quick_config(max_retries: u32) -> CacheConfig {
    CacheConfig::default().with_lock_max_retries(max_retries)
}
