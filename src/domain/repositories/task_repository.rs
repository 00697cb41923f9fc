use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::task::{Task, TaskId};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository is closed")]
    Closed,
    #[error("invalid task: {0}")]
    InvalidData(String),
    #[error("storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Fetch a single task; `None` when it does not exist
    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>>;

    /// Insert or replace a task
    async fn insert(&self, task: Task) -> Result<()>;

    /// Every stored task regardless of status
    async fn list_all(&self) -> Result<Vec<Task>>;
}
