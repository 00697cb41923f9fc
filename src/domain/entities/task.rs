use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Deleted,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Deleted => "deleted",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "⏳",
            TaskStatus::Completed => "✅",
            TaskStatus::Deleted => "🗑️",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "uuid")]
    pub id: TaskId,
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<DateTime<Utc>>, // instant the reminder should fire at
}

impl Task {
    /// Creates a new pending task with a fresh id
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            project: String::new(),
            tags: Vec::new(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            due: None,
            notify: None,
        }
    }

    pub fn with_notify(mut self, notify: DateTime<Utc>) -> Self {
        self.notify = Some(notify);
        self
    }

    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due = Some(due);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Returns the notify instant if the task still wants a reminder after `now`
    pub fn pending_reminder_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.is_pending() {
            return None;
        }
        self.notify.filter(|notify| *notify > now)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_nil() {
            return Err("uuid should not be nil".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("description should not be empty".to_string());
        }
        Ok(())
    }

    /// Normalizes project and tags, and falls back to the due date for the reminder
    pub fn unify(&mut self) {
        self.project = self.project.trim().to_lowercase();

        let mut tags: Vec<String> = self
            .tags
            .iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        self.tags = tags;

        if self.notify.is_none() {
            self.notify = self.due;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn unify_normalizes_tags_and_project() {
        let mut task = Task::new("buy milk");
        task.project = "  Home ".to_string();
        task.tags = vec!["Shop".into(), " ".into(), "errands".into(), "shop".into()];

        task.unify();

        assert_eq!(task.project, "home");
        assert_eq!(task.tags, vec!["errands".to_string(), "shop".to_string()]);
    }

    #[test]
    fn unify_defaults_notify_to_due() {
        let due = Utc::now() + Duration::hours(3);
        let mut task = Task::new("dentist").with_due(due);

        task.unify();
        assert_eq!(task.notify, Some(due));

        let notify = Utc::now() + Duration::hours(1);
        let mut task = Task::new("dentist").with_due(due).with_notify(notify);
        task.unify();
        assert_eq!(task.notify, Some(notify));
    }

    #[test]
    fn validate_rejects_empty_description() {
        let task = Task::new("   ");
        assert!(task.validate().is_err());

        let mut task = Task::new("ok");
        task.id = Uuid::nil();
        assert!(task.validate().is_err());
    }

    #[test]
    fn pending_reminder_requires_pending_and_future() {
        let now = Utc::now();
        let future = now + Duration::minutes(5);

        assert_eq!(
            Task::new("a").with_notify(future).pending_reminder_after(now),
            Some(future)
        );
        assert_eq!(
            Task::new("a").with_notify(now).pending_reminder_after(now),
            None
        );
        assert_eq!(
            Task::new("a")
                .with_notify(future)
                .with_status(TaskStatus::Completed)
                .pending_reminder_after(now),
            None
        );
        assert_eq!(Task::new("a").pending_reminder_after(now), None);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Deleted).unwrap();
        assert_eq!(json, "\"deleted\"");
        let status: TaskStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, TaskStatus::Pending);
        assert!(serde_json::from_str::<TaskStatus>("\"invalid\"").is_err());
    }
}
