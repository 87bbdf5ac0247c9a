//! Repository trait for tasks.
//!
//! The persistent store is an external collaborator; the cache layer never
//! talks to it. Only the task service does.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::{Task, TaskFilter, TaskId, UserId};

// =============================================================================
// Repository Error
// =============================================================================

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

// =============================================================================
// Task Repository
// =============================================================================

/// Storage of tasks, always scoped to their owner.
pub trait TaskRepository: Send + Sync {
    /// Tasks of `owner` selected by `filter`, newest `created_at` first.
    fn find_by_owner<'a>(
        &'a self,
        owner: &'a UserId,
        filter: &'a TaskFilter,
    ) -> BoxFuture<'a, Result<Vec<Task>, RepositoryError>>;

    /// The task `task_id` if it exists and belongs to `owner`.
    fn find_owned<'a>(
        &'a self,
        owner: &'a UserId,
        task_id: &'a TaskId,
    ) -> BoxFuture<'a, Result<Option<Task>, RepositoryError>>;

    /// Inserts or replaces a task.
    fn save<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<(), RepositoryError>>;

    /// Deletes `task_id` if it belongs to `owner`; returns whether it did.
    fn delete_owned<'a>(
        &'a self,
        owner: &'a UserId,
        task_id: &'a TaskId,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>>;
}
