pub mod notification_sink;
pub mod task_repository;

pub use notification_sink::{NotificationSink, SendOptions};
pub use task_repository::{RepositoryError, TaskRepository};
