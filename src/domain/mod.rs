//! Domain module for task tracking.
//!
//! This module contains the task entity, its value objects, listing
//! filters and the listing snapshot that the cache layer stores.

pub mod filter;
pub mod listing;
pub mod task;

pub use filter::{FilterError, TaskFilter};
pub use listing::{TaskListing, TaskView};
pub use task::{Task, TaskId, TaskStatus, Timestamp, UserId, parse_calendar_date};
