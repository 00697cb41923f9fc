pub mod task;
pub mod task_filter;

pub use task::{Task, TaskId, TaskStatus};
pub use task_filter::TaskFilter;
