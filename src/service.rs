//! Task service.
//!
//! Ties the task repository to the listing cache: reads go through the
//! read-through cache, and every mutation invalidates the owner's cached
//! listings after it has been written.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::{CacheInvalidator, CacheStore, ListingCache, ListingLookup};
use crate::config::CacheConfig;
use crate::domain::{Task, TaskFilter, TaskId, TaskListing, TaskStatus, TaskView, Timestamp, UserId};
use crate::infrastructure::{RepositoryError, TaskRepository};

// =============================================================================
// Errors
// =============================================================================

/// Errors returned by [`TaskService`]. Cache failures never show up here.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The task does not exist or belongs to another user.
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Task description must not be empty")]
    InvalidDescription,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// =============================================================================
// Commands
// =============================================================================

/// Input for [`TaskService::create_task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub description: String,
    pub due_date: Timestamp,
    /// Defaults to pending.
    pub status: Option<TaskStatus>,
}

/// Partial update for [`TaskService::update_task`]. `None` keeps the field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskUpdate {
    pub description: Option<String>,
    pub due_date: Option<Timestamp>,
    pub status: Option<TaskStatus>,
}

fn validate_description(description: &str) -> Result<String, ServiceError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        Err(ServiceError::InvalidDescription)
    } else {
        Ok(trimmed.to_string())
    }
}

// =============================================================================
// Task Service
// =============================================================================

/// Task operations of a single user, with cached listings.
#[derive(Clone)]
pub struct TaskService {
    repository: Arc<dyn TaskRepository>,
    cache: ListingCache,
    invalidator: CacheInvalidator,
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TaskService")
            .field("cache", &self.cache)
            .field("invalidator", &self.invalidator)
            .finish_non_exhaustive()
    }
}

impl TaskService {
    #[must_use]
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        store: Arc<dyn CacheStore>,
        config: CacheConfig,
    ) -> Self {
        let invalidator = CacheInvalidator::new(store.clone(), &config);
        Self {
            repository,
            cache: ListingCache::new(store, config),
            invalidator,
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &ListingCache {
        &self.cache
    }

    /// Lists the user's tasks matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the listing has to be loaded
    /// and the repository fails.
    pub async fn list_tasks(
        &self,
        user_id: &UserId,
        filter: &TaskFilter,
    ) -> Result<TaskListing, ServiceError> {
        let lookup = self.cache.lookup(user_id, filter).await;
        let holds_lock = lookup == ListingLookup::LockAcquired;
        if let Some(listing) = lookup.into_listing() {
            return Ok(listing);
        }

        let tasks = match self.repository.find_by_owner(user_id, filter).await {
            Ok(tasks) => tasks,
            Err(error) => {
                if holds_lock {
                    self.cache.abandon_rebuild(user_id, filter).await;
                }
                return Err(error.into());
            }
        };

        let listing: TaskListing = tasks.iter().collect();
        self.cache.set_cached(user_id, &listing, filter).await;
        Ok(listing)
    }

    /// Creates a task for `user_id`.
    ///
    /// # Errors
    ///
    /// `InvalidDescription` for a blank description, `Repository` if the
    /// task cannot be saved.
    pub async fn create_task(
        &self,
        user_id: &UserId,
        new_task: NewTask,
    ) -> Result<TaskView, ServiceError> {
        let description = validate_description(&new_task.description)?;
        let task = Task::new(
            TaskId::generate(),
            user_id.clone(),
            description,
            new_task.due_date,
            Timestamp::now(),
        )
        .with_status(new_task.status.unwrap_or_default());

        self.repository.save(&task).await?;
        self.invalidator.invalidate_all(user_id).await;

        tracing::debug!(user_id = %user_id, task_id = %task.task_id, "Created task");
        Ok(TaskView::from(&task))
    }

    /// Applies `update` to one of the user's tasks.
    ///
    /// # Errors
    ///
    /// `NotFound` if the task is absent or owned by someone else,
    /// `InvalidDescription` for a blank new description, `Repository` on
    /// storage failure.
    pub async fn update_task(
        &self,
        user_id: &UserId,
        task_id: &TaskId,
        update: TaskUpdate,
    ) -> Result<TaskView, ServiceError> {
        let description = update
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?;

        let current = self
            .repository
            .find_owned(user_id, task_id)
            .await?
            .ok_or(ServiceError::NotFound(*task_id))?;

        let task = Task {
            description: description.unwrap_or(current.description),
            due_date: update.due_date.unwrap_or(current.due_date),
            status: update.status.unwrap_or(current.status),
            ..current
        };

        self.repository.save(&task).await?;
        self.invalidator.invalidate_all(user_id).await;

        tracing::debug!(user_id = %user_id, task_id = %task_id, "Updated task");
        Ok(TaskView::from(&task))
    }

    /// Deletes one of the user's tasks.
    ///
    /// # Errors
    ///
    /// `NotFound` if the task is absent or owned by someone else,
    /// `Repository` on storage failure.
    pub async fn delete_task(&self, user_id: &UserId, task_id: &TaskId) -> Result<(), ServiceError> {
        if !self.repository.delete_owned(user_id, task_id).await? {
            return Err(ServiceError::NotFound(*task_id));
        }
        self.invalidator.invalidate_all(user_id).await;

        tracing::debug!(user_id = %user_id, task_id = %task_id, "Deleted task");
        Ok(())
    }
}
