//! Infrastructure layer.
//!
//! Adapters behind the cache store and task repository ports:
//!
//! - `RedisCacheStore`: production store on `deadpool-redis` (feature `redis`)
//! - `InMemoryCacheStore`: store with TTLs and Redis glob matching, for tests
//! - `FailingCacheStore`: decorator that rejects selected operations
//! - `InMemoryTaskRepository`: task storage for tests and local runs

mod fail_injection;
mod in_memory;
#[cfg(feature = "redis")]
mod redis;
mod repository;

pub use fail_injection::{FailingCacheStore, StoreOperation};
pub use in_memory::{InMemoryCacheStore, InMemoryTaskRepository};
#[cfg(feature = "redis")]
pub use redis::RedisCacheStore;
pub use repository::{RepositoryError, TaskRepository};
