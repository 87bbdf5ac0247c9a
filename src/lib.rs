//! # task-tracker
//!
//! Task listings for a multi-user task tracker, served through a
//! stampede-protected, filter-aware read-through cache.
//!
//! ## Overview
//!
//! - **Domain**: tasks, listing filters and the listing snapshot
//! - **Cache**: key builder, rebuild lock, read-through cache, invalidator
//!   and JSON codec, all written against the [`cache::CacheStore`] port
//! - **Infrastructure**: Redis and in-memory stores, fail injection, and
//!   the task repository port
//! - **Service**: list, create, update and delete tasks with cached
//!   listings invalidated on every write
//!
//! Cache failures never reach callers: they are logged through `tracing`
//! and turned into misses or no-ops.
//!
//! ## Feature Flags
//!
//! - `redis` (default): `RedisCacheStore` on `deadpool-redis`
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use task_tracker::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let repository = Arc::new(InMemoryTaskRepository::new());
//! let store = Arc::new(InMemoryCacheStore::new());
//! let service = TaskService::new(repository, store, CacheConfig::default());
//!
//! let user_id = UserId::new("alice");
//! let listing = service.list_tasks(&user_id, &TaskFilter::all()).await.unwrap();
//! assert!(listing.is_empty());
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use task_tracker::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{
        CacheInvalidator, CacheStore, CacheStoreError, ListingCache, ListingLookup,
    };
    pub use crate::config::{AppConfig, CacheConfig, RedisConfig};
    pub use crate::domain::{
        Task, TaskFilter, TaskId, TaskListing, TaskStatus, TaskView, Timestamp, UserId,
    };
    #[cfg(feature = "redis")]
    pub use crate::infrastructure::RedisCacheStore;
    pub use crate::infrastructure::{InMemoryCacheStore, InMemoryTaskRepository, TaskRepository};
    pub use crate::service::{NewTask, ServiceError, TaskService, TaskUpdate};
}

pub mod cache;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod service;
