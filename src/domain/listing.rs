//! Listing snapshots returned to callers and stored in the cache.
//!
//! Field names follow the JSON payload already present in deployed caches
//! (`dueDate`, `createdAt`), so entries written before a deploy stay readable.

use serde::{Deserialize, Serialize};

use super::task::{Task, TaskId, TaskStatus, Timestamp};

/// A task as presented to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
    pub due_date: Timestamp,
    pub created_at: Timestamp,
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        Self {
            id: task.task_id,
            description: task.description.clone(),
            status: task.status,
            due_date: task.due_date,
            created_at: task.created_at,
        }
    }
}

/// An ordered snapshot of a user's tasks (newest first).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskListing {
    pub tasks: Vec<TaskView>,
}

impl TaskListing {
    #[must_use]
    pub const fn new(tasks: Vec<TaskView>) -> Self {
        Self { tasks }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<'a> FromIterator<&'a Task> for TaskListing {
    fn from_iter<I: IntoIterator<Item = &'a Task>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(TaskView::from).collect())
    }
}
