pub mod entities;
pub mod repositories;

pub use entities::{Task, TaskFilter, TaskId, TaskStatus};
pub use repositories::{NotificationSink, RepositoryError, SendOptions, TaskRepository};
