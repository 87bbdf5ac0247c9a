//! Listing filters.
//!
//! A filter is a closed structure with two optional fields. Absent fields
//! mean "any value", so `TaskFilter::default()` selects every task.

use chrono::NaiveDate;
use thiserror::Error;

use super::task::{Task, TaskStatus, parse_calendar_date};

/// Errors raised while parsing filter parameters from raw input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Invalid status filter: {0}")]
    InvalidStatus(String),

    #[error("Invalid due date filter (expected YYYY-MM-DD): {0}")]
    InvalidDueDate(String),
}

/// Filter parameters for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
}

impl TaskFilter {
    /// The filter selecting every task.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            status: None,
            due_date: None,
        }
    }

    #[must_use]
    pub const fn with_status(self, status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..self
        }
    }

    #[must_use]
    pub const fn with_due_date(self, due_date: NaiveDate) -> Self {
        Self {
            due_date: Some(due_date),
            ..self
        }
    }

    /// Parses raw query parameters.
    ///
    /// # Errors
    ///
    /// Returns `FilterError` when `status` is not `pending`/`completed` or
    /// `due_date` is not a valid `YYYY-MM-DD` date.
    pub fn parse(status: Option<&str>, due_date: Option<&str>) -> Result<Self, FilterError> {
        let status = status
            .map(|value| {
                value
                    .parse::<TaskStatus>()
                    .map_err(|_| FilterError::InvalidStatus(value.to_string()))
            })
            .transpose()?;

        let due_date = due_date
            .map(|value| {
                parse_calendar_date(value)
                    .ok_or_else(|| FilterError::InvalidDueDate(value.to_string()))
            })
            .transpose()?;

        Ok(Self { status, due_date })
    }

    /// Whether `task` is selected by this filter.
    ///
    /// The due date matches when the task falls due on that UTC calendar day.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let status_matches = self.status.is_none_or(|status| task.status == status);
        let due_date_matches = self
            .due_date
            .is_none_or(|date| task.due_date.calendar_date() == date);
        status_matches && due_date_matches
    }
}
