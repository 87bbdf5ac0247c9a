//! Task domain model.
//!
//! Tasks are owned by a single user and carry a description, a status,
//! a due date and a creation timestamp. Listings of tasks are what the
//! cache layer stores, so every type here that appears in a listing has a
//! stable textual form.

use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Opaque identifier of the user owning a task.
///
/// The identifier is issued by the authentication layer; this crate never
/// interprets it beyond using it as a namespace for cache keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generates a new time-ordered `TaskId` (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A UTC instant with millisecond precision.
///
/// Sub-millisecond digits are truncated on construction. The textual form
/// written to the cache carries exactly three fractional digits, so a
/// `Timestamp` survives an encode/decode cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp`, truncating to millisecond precision.
    #[must_use]
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.trunc_subsecs(3))
    }

    /// Midnight (UTC) at the start of the given calendar date.
    #[must_use]
    pub fn from_calendar_date(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN).and_utc())
    }

    /// Returns the current time as a `Timestamp`.
    ///
    /// **Note**: reads the system clock.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// The UTC calendar day this instant falls on.
    #[must_use]
    pub fn calendar_date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Formats as `YYYY-MM-DDTHH:MM:SS.sssZ`.
    #[must_use]
    pub fn to_iso_string(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    /// Recognizes the two textual date forms found in cached listings.
    ///
    /// Accepts exactly `YYYY-MM-DD` (read as midnight UTC) and
    /// `YYYY-MM-DDTHH:MM:SS(.sss)Z`. Returns `None` for any other shape and
    /// for shapes that do not denote a real calendar date or time of day.
    #[must_use]
    pub fn parse_iso(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        let date = parse_date_prefix(bytes)?;

        match bytes.len() {
            10 => Some(Self::from_calendar_date(date)),
            20 | 24 => {
                let time = parse_time_suffix(&bytes[10..])?;
                Some(Self(date.and_time(time).and_utc()))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.to_iso_string())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse_iso(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: '{text}'")))
    }
}

/// Parses a strict `YYYY-MM-DD` calendar date.
#[must_use]
pub fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    if bytes.len() != 10 {
        return None;
    }
    parse_date_prefix(bytes)
}

// =============================================================================
// Textual Date Shapes
// =============================================================================

fn all_digits(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_digit)
}

fn digits_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0, |accumulator, byte| accumulator * 10 + u32::from(byte - b'0'))
}

/// `YYYY-MM-DD` at the start of `bytes`.
fn parse_date_prefix(bytes: &[u8]) -> Option<NaiveDate> {
    if bytes.len() < 10
        || !all_digits(&bytes[0..4])
        || bytes[4] != b'-'
        || !all_digits(&bytes[5..7])
        || bytes[7] != b'-'
        || !all_digits(&bytes[8..10])
    {
        return None;
    }

    #[allow(clippy::cast_possible_wrap)]
    let year = digits_value(&bytes[0..4]) as i32;
    NaiveDate::from_ymd_opt(year, digits_value(&bytes[5..7]), digits_value(&bytes[8..10]))
}

/// `THH:MM:SSZ` or `THH:MM:SS.sssZ`.
fn parse_time_suffix(bytes: &[u8]) -> Option<NaiveTime> {
    let shape_ok = bytes.len() >= 10
        && bytes[0] == b'T'
        && all_digits(&bytes[1..3])
        && bytes[3] == b':'
        && all_digits(&bytes[4..6])
        && bytes[6] == b':'
        && all_digits(&bytes[7..9]);
    if !shape_ok {
        return None;
    }

    let millis = match bytes.len() {
        10 if bytes[9] == b'Z' => 0,
        14 if bytes[9] == b'.' && all_digits(&bytes[10..13]) && bytes[13] == b'Z' => {
            digits_value(&bytes[10..13])
        }
        _ => return None,
    };

    NaiveTime::from_hms_milli_opt(
        digits_value(&bytes[1..3]),
        digits_value(&bytes[4..6]),
        digits_value(&bytes[7..9]),
        millis,
    )
}

// =============================================================================
// Enums
// =============================================================================

/// The status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    /// The lowercase wire name, also used inside cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown task status: {value}")),
        }
    }
}

// =============================================================================
// Task Entity
// =============================================================================

/// A task owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub task_id: TaskId,
    pub owner: UserId,
    pub description: String,
    pub status: TaskStatus,
    pub due_date: Timestamp,
    pub created_at: Timestamp,
}

impl Task {
    /// Creates a pending task.
    ///
    /// This is a pure function; identifiers and timestamps are supplied by
    /// the caller.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        owner: UserId,
        description: impl Into<String>,
        due_date: Timestamp,
        created_at: Timestamp,
    ) -> Self {
        Self {
            task_id,
            owner,
            description: description.into(),
            status: TaskStatus::Pending,
            due_date,
            created_at,
        }
    }

    /// Returns a new task with the given status.
    #[must_use]
    pub fn with_status(self, status: TaskStatus) -> Self {
        Self { status, ..self }
    }

    #[must_use]
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.owner == user_id
    }
}
