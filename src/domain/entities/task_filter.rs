use crate::domain::entities::task::{Task, TaskStatus};

/// Status visibility applied to task lists before they are shown or scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskFilter {
    pub show_pending: bool,
    pub show_completed: bool,
    pub show_deleted: bool,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            show_pending: true,
            show_completed: false,
            show_deleted: false,
        }
    }
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match task.status {
            TaskStatus::Pending => self.show_pending,
            TaskStatus::Completed => self.show_completed,
            TaskStatus::Deleted => self.show_deleted,
        }
    }

    pub fn apply(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.retain(|task| self.matches(task));
        tasks
    }
}
