use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::domain::entities::task::{Task, TaskId};
use crate::domain::repositories::{NotificationSink, SendOptions, TaskRepository};

/// Turns a due reminder into a message on the notification sink
#[derive(Clone)]
pub struct NotificationService {
    tasks: Arc<dyn TaskRepository>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationService {
    pub fn new(tasks: Arc<dyn TaskRepository>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { tasks, sink }
    }

    /// Sends the reminder for a task, reading its current state from the store.
    ///
    /// A task that was removed or is no longer pending is skipped without error.
    pub async fn send_task_reminder(&self, task_id: TaskId) -> anyhow::Result<()> {
        let task = self
            .tasks
            .get_by_id(task_id)
            .await
            .with_context(|| format!("on search task ({})", task_id))?;

        let Some(task) = task else {
            info!(task_id = %task_id, "try to notify about task, but it is not found");
            return Ok(());
        };
        if !task.is_pending() {
            info!(
                task_id = %task_id,
                status = %task.status,
                "try to notify about task, but it has no pending status"
            );
            return Ok(());
        }

        info!(task_id = %task_id, "notify task ({})", task.description);

        let message = Self::render_task(&task);
        self.sink
            .send(&message, SendOptions::default().with_alert().with_task_link(task_id))
            .await
            .with_context(|| format!("cant send notify ({})", task_id))
    }

    /// Plain-text reminder body
    pub fn render_task(task: &Task) -> String {
        let mut lines = vec![format!("{} {}", task.status.emoji(), task.description)];

        if !task.project.is_empty() {
            lines.push(format!("Project: {}", task.project));
        }
        if !task.tags.is_empty() {
            lines.push(format!("Tags: {}", task.tags.join(", ")));
        }
        if let Some(due) = task.due {
            lines.push(format!("Due: {}", due.format("%A, %d %B %Y at %H:%M UTC")));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::entities::task::TaskStatus;
    use crate::infrastructure::repositories::JsonTaskRepository;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub sent: Mutex<Vec<(String, SendOptions)>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, message: &str, options: SendOptions) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((message.to_string(), options));
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn send(&self, _message: &str, _options: SendOptions) -> anyhow::Result<()> {
            anyhow::bail!("chat unreachable")
        }
    }

    #[tokio::test]
    async fn sends_pending_task_with_alert_and_link() {
        let repo = Arc::new(JsonTaskRepository::in_memory());
        let sink = Arc::new(RecordingSink::default());
        let task = Task::new("call mom");
        repo.insert(task.clone()).await.unwrap();

        let service = NotificationService::new(repo, sink.clone());
        service.send_task_reminder(task.id).await.unwrap();

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.contains("call mom"));
        assert!(sent[0].1.enable_alert);
        assert_eq!(sent[0].1.task_link, Some(task.id));
    }

    #[tokio::test]
    async fn skips_missing_and_finished_tasks() {
        let repo = Arc::new(JsonTaskRepository::in_memory());
        let sink = Arc::new(RecordingSink::default());
        let done = Task::new("done already").with_status(TaskStatus::Completed);
        repo.insert(done.clone()).await.unwrap();

        let service = NotificationService::new(repo, sink.clone());
        service.send_task_reminder(done.id).await.unwrap();
        service.send_task_reminder(uuid::Uuid::new_v4()).await.unwrap();

        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_is_returned() {
        let repo = Arc::new(JsonTaskRepository::in_memory());
        let task = Task::new("water plants");
        repo.insert(task.clone()).await.unwrap();

        let service = NotificationService::new(repo, Arc::new(FailingSink));
        let err = service.send_task_reminder(task.id).await.unwrap_err();

        assert!(format!("{:#}", err).contains("chat unreachable"));
    }

    #[test]
    fn renders_optional_fields() {
        let mut task = Task::new("ship release")
            .with_due(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap());
        task.project = "work".into();
        task.tags = vec!["deploy".into(), "urgent".into()];

        let text = NotificationService::render_task(&task);

        assert_eq!(
            text,
            "⏳ ship release\nProject: work\nTags: deploy, urgent\nDue: Friday, 01 March 2024 at 15:00 UTC"
        );
    }
}
