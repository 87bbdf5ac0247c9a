//! In-memory implementations of the cache store and the task repository.
//!
//! These are suitable for tests and single-process deployments.
//!
//! # Cache Store Semantics
//!
//! - TTLs are measured on the Tokio clock, so paused-time tests can advance
//!   past an expiry; expired entries are dropped when read and when a scan
//!   walks over them
//! - `set` with [`SetCondition::IfAbsent`] checks and writes under one lock
//! - `scan` walks the sorted key space; a cursor remembers the last key it
//!   examined, so keys removed between calls never cause others to be skipped;
//!   at most `MAX_OPEN_CURSORS` cursors are kept, the oldest is dropped first
//! - patterns follow Redis glob syntax: `*`, `?`, `[...]`, `[^...]`, `\`

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::cache::{CacheStore, CacheStoreError, ScanPage, SetCondition};
use crate::domain::{Task, TaskFilter, TaskId, UserId};
use crate::infrastructure::{RepositoryError, TaskRepository};

/// Open scan cursors kept per store. Resuming a dropped cursor fails like an
/// unknown Redis cursor.
const MAX_OPEN_CURSORS: usize = 256;

fn ready<'a, T: Send + 'a>(value: T) -> BoxFuture<'a, T> {
    Box::pin(futures::future::ready(value))
}

// =============================================================================
// In-Memory Cache Store
// =============================================================================

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Default)]
struct StoreState {
    entries: BTreeMap<String, Entry>,
    /// Open scan cursors: cursor id -> last key examined. Ids only grow, so
    /// the first entry is the oldest.
    cursors: BTreeMap<u64, String>,
    last_cursor: u64,
}

impl StoreState {
    fn live_value(&mut self, key: &str, now: Instant) -> Option<&Entry> {
        if self.entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }

    fn open_cursor(&mut self, last_key: String) -> u64 {
        self.last_cursor = self.last_cursor.wrapping_add(1).max(1);
        self.cursors.insert(self.last_cursor, last_key);
        while self.cursors.len() > MAX_OPEN_CURSORS {
            self.cursors.pop_first();
        }
        self.last_cursor
    }
}

/// Process-local [`CacheStore`] with TTL expiry and glob scans.
///
/// Clones share the same key space.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.state
            .lock()
            .entries
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unexpired keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.state
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn scan_now(
        &self,
        cursor: u64,
        pattern: &str,
        batch_size: usize,
    ) -> Result<ScanPage, CacheStoreError> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let start = if cursor == 0 {
            Bound::Unbounded
        } else {
            let last_key = state
                .cursors
                .remove(&cursor)
                .ok_or_else(|| CacheStoreError::Command(format!("invalid scan cursor {cursor}")))?;
            Bound::Excluded(last_key)
        };

        let examined: Vec<(String, bool)> = state
            .entries
            .range::<String, _>((start, Bound::Unbounded))
            .take(batch_size.max(1) + 1)
            .map(|(key, entry)| (key.clone(), entry.is_live(now)))
            .collect();

        for (key, _) in examined.iter().filter(|(_, live)| !live) {
            state.entries.remove(key);
        }

        let has_more = examined.len() > batch_size.max(1);
        let page: Vec<(String, bool)> = examined.into_iter().take(batch_size.max(1)).collect();

        let keys = page
            .iter()
            .filter(|(key, live)| *live && glob_match(pattern.as_bytes(), key.as_bytes()))
            .map(|(key, _)| key.clone())
            .collect();

        let next_cursor = match page.last() {
            Some((last_key, _)) if has_more => state.open_cursor(last_key.clone()),
            _ => 0,
        };

        Ok(ScanPage::new(next_cursor, keys))
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CacheStoreError>> {
        let now = Instant::now();
        let value = self
            .state
            .lock()
            .live_value(key, now)
            .map(|entry| entry.value.clone());
        ready(Ok(value))
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
        condition: SetCondition,
    ) -> BoxFuture<'a, Result<bool, CacheStoreError>> {
        let now = Instant::now();
        let mut state = self.state.lock();

        if condition == SetCondition::IfAbsent && state.live_value(key, now).is_some() {
            return ready(Ok(false));
        }

        state.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + Duration::from_secs(crate::cache::store::expiry_seconds(ttl)),
            },
        );
        ready(Ok(true))
    }

    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<u64, CacheStoreError>> {
        let now = Instant::now();
        let found = self.state.lock().live_value(key, now).is_some();
        ready(Ok(u64::from(found)))
    }

    fn scan<'a>(
        &'a self,
        cursor: u64,
        pattern: &'a str,
        batch_size: usize,
    ) -> BoxFuture<'a, Result<ScanPage, CacheStoreError>> {
        ready(self.scan_now(cursor, pattern, batch_size))
    }

    fn unlink<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<u64, CacheStoreError>> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let removed = keys
            .iter()
            .filter_map(|key| state.entries.remove(key))
            .filter(|entry| entry.is_live(now))
            .count();
        ready(Ok(removed as u64))
    }
}

// =============================================================================
// Glob Matching
// =============================================================================

/// Redis-style glob match over bytes.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let mut pattern_index = 0;
    let mut text_index = 0;
    // Position of the last `*` and the text index it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while text_index < text.len() {
        let byte = text[text_index];
        let step = match pattern.get(pattern_index) {
            Some(b'*') => {
                backtrack = Some((pattern_index, text_index));
                pattern_index += 1;
                continue;
            }
            Some(b'?') => Some(pattern_index + 1),
            Some(b'[') => match match_class(pattern, pattern_index, byte) {
                Some((true, next)) => Some(next),
                Some((false, _)) => None,
                None => (byte == b'[').then_some(pattern_index + 1),
            },
            Some(b'\\') if pattern_index + 1 < pattern.len() => {
                (pattern[pattern_index + 1] == byte).then_some(pattern_index + 2)
            }
            Some(&literal) => (literal == byte).then_some(pattern_index + 1),
            None => None,
        };

        if let Some(next) = step {
            pattern_index = next;
            text_index += 1;
            continue;
        }

        match backtrack {
            Some((star_index, absorbed)) => {
                pattern_index = star_index + 1;
                text_index = absorbed + 1;
                backtrack = Some((star_index, absorbed + 1));
            }
            None => return false,
        }
    }

    pattern[pattern_index.min(pattern.len())..]
        .iter()
        .all(|&byte| byte == b'*')
}

/// Matches `byte` against the class opening at `start`.
///
/// Returns whether it matched and the index just past `]`, or `None` if
/// the class is unterminated (the `[` is then a literal).
fn match_class(pattern: &[u8], start: usize, byte: u8) -> Option<(bool, usize)> {
    let mut index = start + 1;
    let negate = pattern.get(index) == Some(&b'^');
    if negate {
        index += 1;
    }

    let mut matched = false;
    while index < pattern.len() && pattern[index] != b']' {
        if pattern[index] == b'\\' && index + 1 < pattern.len() {
            index += 1;
        }
        let low = pattern[index];

        if pattern.get(index + 1) == Some(&b'-')
            && index + 2 < pattern.len()
            && pattern[index + 2] != b']'
        {
            let high = pattern[index + 2];
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            matched |= (low..=high).contains(&byte);
            index += 3;
        } else {
            matched |= low == byte;
            index += 1;
        }
    }

    if index >= pattern.len() {
        return None;
    }
    Some((matched != negate, index + 1))
}

// =============================================================================
// In-Memory Task Repository
// =============================================================================

/// In-memory implementation of `TaskRepository`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn find_by_owner<'a>(
        &'a self,
        owner: &'a UserId,
        filter: &'a TaskFilter,
    ) -> BoxFuture<'a, Result<Vec<Task>, RepositoryError>> {
        Box::pin(async move {
            let tasks = self.tasks.read().await;
            let mut owned: Vec<Task> = tasks
                .values()
                .filter(|task| task.is_owned_by(owner) && filter.matches(task))
                .cloned()
                .collect();
            owned.sort_by(|left, right| {
                right
                    .created_at
                    .cmp(&left.created_at)
                    .then_with(|| right.task_id.cmp(&left.task_id))
            });
            Ok(owned)
        })
    }

    fn find_owned<'a>(
        &'a self,
        owner: &'a UserId,
        task_id: &'a TaskId,
    ) -> BoxFuture<'a, Result<Option<Task>, RepositoryError>> {
        Box::pin(async move {
            let tasks = self.tasks.read().await;
            Ok(tasks
                .get(task_id)
                .filter(|task| task.is_owned_by(owner))
                .cloned())
        })
    }

    fn save<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<(), RepositoryError>> {
        Box::pin(async move {
            self.tasks.write().await.insert(task.task_id, task.clone());
            Ok(())
        })
    }

    fn delete_owned<'a>(
        &'a self,
        owner: &'a UserId,
        task_id: &'a TaskId,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(async move {
            let mut tasks = self.tasks.write().await;
            if tasks.get(task_id).is_some_and(|task| task.is_owned_by(owner)) {
                tasks.remove(task_id);
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }
}
