use async_trait::async_trait;

use crate::domain::entities::task::TaskId;

/// Delivery flags attached to an outgoing message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Deliver with a sound/push alert instead of silently
    pub enable_alert: bool,
    /// Attach a deep link that opens this task
    pub task_link: Option<TaskId>,
}

impl SendOptions {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_alert(mut self) -> Self {
        self.enable_alert = true;
        self
    }

    pub fn with_task_link(mut self, id: TaskId) -> Self {
        self.task_link = Some(id);
        self
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &str, options: SendOptions) -> anyhow::Result<()>;
}
