//! Cache key generation.
//!
//! # Key Design
//!
//! - Listing key: `tasks:user:{user}:status:{status|all}:due:{YYYY-MM-DD|all}`
//! - Lock key: `lock:` + listing key
//! - Listing pattern: `tasks:user:{user}:*`
//! - Lock pattern: `lock:` + listing pattern
//!
//! Absent filter fields become the token `all`, so semantically equal
//! filters always produce the same key. The user segment is escaped: a
//! user identifier can contain neither the `:` separator nor a glob
//! metacharacter once it is inside a key, which keeps keys partitioned by
//! user and keeps each user's pattern from matching another user's keys.

use std::borrow::Cow;
use std::fmt::Write;

use crate::domain::{TaskFilter, UserId};

const LISTING_PREFIX: &str = "tasks:user:";
const LOCK_PREFIX: &str = "lock:";
const ANY: &str = "all";

/// Escapes the characters that would break key partitioning or glob
/// matching: the separator, glob metacharacters and the escape marker.
fn escape_segment(raw: &str) -> Cow<'_, str> {
    const RESERVED: &[char] = &['%', ':', '*', '?', '[', ']', '\\'];

    if !raw.contains(RESERVED) {
        return Cow::Borrowed(raw);
    }

    let mut escaped = String::with_capacity(raw.len() + 8);
    for character in raw.chars() {
        if RESERVED.contains(&character) {
            // ASCII only, so the code point fits in two hex digits.
            let _ = write!(escaped, "%{:02X}", u32::from(character));
        } else {
            escaped.push(character);
        }
    }
    Cow::Owned(escaped)
}

fn user_prefix(user_id: &UserId) -> String {
    format!("{LISTING_PREFIX}{}:", escape_segment(user_id.as_str()))
}

/// The key under which the listing for `(user_id, filter)` is cached.
#[must_use]
pub fn listing_key(user_id: &UserId, filter: &TaskFilter) -> String {
    let status = filter.status.map_or(ANY, |status| status.as_str());
    let due_date = filter
        .due_date
        .map_or_else(|| ANY.to_string(), |date| date.format("%Y-%m-%d").to_string());

    format!("{}status:{status}:due:{due_date}", user_prefix(user_id))
}

/// The rebuild lock guarding `listing_key(user_id, filter)`.
#[must_use]
pub fn lock_key(user_id: &UserId, filter: &TaskFilter) -> String {
    lock_key_for(&listing_key(user_id, filter))
}

/// Applies the lock prefix to a listing key or pattern.
#[must_use]
pub fn lock_key_for(listing_key_or_pattern: &str) -> String {
    format!("{LOCK_PREFIX}{listing_key_or_pattern}")
}

/// Glob matching every listing key of `user_id`, whatever the filter.
#[must_use]
pub fn listing_pattern(user_id: &UserId) -> String {
    format!("{}*", user_prefix(user_id))
}

/// Glob matching every lock key of `user_id`.
#[must_use]
pub fn lock_pattern(user_id: &UserId) -> String {
    lock_key_for(&listing_pattern(user_id))
}
