//! The cache store port.
//!
//! The listing cache depends only on the primitives below and on the
//! atomicity of a conditional set with expiry. Implementations live in
//! [`crate::infrastructure`]; the store is injected as `Arc<dyn CacheStore>`.

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

// =============================================================================
// Cache Store Error
// =============================================================================

/// Errors reported by a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheStoreError {
    /// No connection could be obtained.
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a command.
    #[error("Cache command error: {0}")]
    Command(String),

    /// The store is deliberately unavailable (fail injection).
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// Primitive Types
// =============================================================================

/// Condition attached to a `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    /// Overwrite unconditionally (`SETEX`).
    #[default]
    Always,
    /// Write only if the key is absent (`SET NX EX`), atomically.
    IfAbsent,
}

/// One page of a cursor-based scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanPage {
    /// Cursor for the next call; `0` means the iteration is complete.
    pub cursor: u64,
    pub keys: Vec<String>,
}

impl ScanPage {
    #[must_use]
    pub const fn new(cursor: u64, keys: Vec<String>) -> Self {
        Self { cursor, keys }
    }

    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// Whole seconds for an expiry, never below one.
///
/// Redis rejects `EX 0`, so sub-second TTLs are rounded up.
#[must_use]
pub fn expiry_seconds(ttl: Duration) -> u64 {
    let seconds = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    seconds.max(1)
}

// =============================================================================
// Cache Store Trait
// =============================================================================

/// Key-value store primitives used by the listing cache.
///
/// Every method is a suspension point; none of them may block the runtime.
pub trait CacheStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CacheStoreError>>;

    /// Stores `value` under `key` with expiry `ttl`.
    ///
    /// Returns `true` if the value was written. With
    /// [`SetCondition::IfAbsent`] the check and the write are one atomic
    /// operation.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
        condition: SetCondition,
    ) -> BoxFuture<'a, Result<bool, CacheStoreError>>;

    /// Returns the number of the given keys that exist (0 or 1 here).
    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<u64, CacheStoreError>>;

    /// Returns up to about `batch_size` keys matching the glob `pattern`,
    /// starting from `cursor` (0 to start).
    fn scan<'a>(
        &'a self,
        cursor: u64,
        pattern: &'a str,
        batch_size: usize,
    ) -> BoxFuture<'a, Result<ScanPage, CacheStoreError>>;

    /// Removes `keys` without blocking the store; returns how many existed.
    fn unlink<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<u64, CacheStoreError>>;
}
