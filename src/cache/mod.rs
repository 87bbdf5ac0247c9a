//! Listing cache.
//!
//! A read-through cache in front of the task-listing query, with
//! filter-aware keys, a stampede lock and per-user invalidation on writes.
//!
//! # Components
//!
//! - [`keys`]: deterministic listing/lock keys and per-user patterns
//! - [`lock`]: best-effort rebuild lock on atomic set-if-absent
//! - [`listing`]: `get_cached` / `set_cached`
//! - [`invalidation`]: `invalidate_all`
//! - [`codec`]: JSON encoding with date revival
//! - [`store`]: the store primitives everything above relies on

pub mod codec;
pub mod invalidation;
pub mod keys;
pub mod listing;
pub mod lock;
pub mod store;

pub use codec::CodecError;
pub use invalidation::CacheInvalidator;
pub use keys::{listing_key, listing_pattern, lock_key, lock_key_for, lock_pattern};
pub use listing::{CacheError, ListingCache, ListingLookup};
pub use lock::ListingLock;
pub use store::{CacheStore, CacheStoreError, ScanPage, SetCondition};
