//! JSON codec for cached listings.
//!
//! Dates lose their type in JSON and come back as strings. Decoding is
//! schema-directed: the date-bearing fields of [`TaskListing`] are revived
//! through [`revive_timestamp`], which accepts exactly `YYYY-MM-DD` and
//! `YYYY-MM-DDTHH:MM:SS(.sss)Z`. For documents without a known schema,
//! [`revive_dates`] applies the same rule to every string in the tree.

use serde_json::Value;
use thiserror::Error;

use crate::domain::{TaskListing, Timestamp};

/// Errors raised while encoding or decoding a cached listing.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode listing: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode listing: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Serializes a listing to its cached text form.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode(listing: &TaskListing) -> Result<String, CodecError> {
    serde_json::to_string(listing).map_err(CodecError::Encode)
}

/// Restores a listing from its cached text form.
///
/// # Errors
///
/// Returns `CodecError::Decode` for malformed JSON, a shape that is not a
/// listing, or a date field that is not a recognizable date.
pub fn decode(text: &str) -> Result<TaskListing, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

/// The reviver's recognition rule for a single string.
#[must_use]
pub fn revive_timestamp(text: &str) -> Option<Timestamp> {
    Timestamp::parse_iso(text)
}

/// Rewrites every revivable string in `value` to its canonical
/// `YYYY-MM-DDTHH:MM:SS.sssZ` form; other strings are left untouched.
#[must_use]
pub fn revive_dates(value: Value) -> Value {
    match value {
        Value::String(text) => match revive_timestamp(&text) {
            Some(timestamp) => Value::String(timestamp.to_iso_string()),
            None => Value::String(text),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(revive_dates).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(name, entry)| (name, revive_dates(entry)))
                .collect(),
        ),
        other => other,
    }
}
