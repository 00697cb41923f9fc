use async_trait::async_trait;
use tracing::info;

use crate::domain::repositories::{NotificationSink, SendOptions};

/// Writes reminders to the log; used when no chat channel is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(&self, message: &str, options: SendOptions) -> anyhow::Result<()> {
        match options.task_link {
            Some(task_id) => info!(alert = options.enable_alert, task_id = %task_id, "reminder: {}", message),
            None => info!(alert = options.enable_alert, "reminder: {}", message),
        }
        Ok(())
    }
}
