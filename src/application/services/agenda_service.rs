use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::info;

use crate::domain::entities::task::Task;
use crate::domain::entities::task_filter::TaskFilter;
use crate::domain::repositories::{NotificationSink, SendOptions, TaskRepository};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskGroup {
    pub title: &'static str,
    pub tasks: Vec<Task>,
}

/// Daily digest of what is due today, this week and overdue
#[derive(Clone)]
pub struct AgendaService {
    tasks: Arc<dyn TaskRepository>,
    sink: Arc<dyn NotificationSink>,
    timezone: Tz,
}

impl AgendaService {
    pub fn new(tasks: Arc<dyn TaskRepository>, sink: Arc<dyn NotificationSink>, timezone: Tz) -> Self {
        Self {
            tasks,
            sink,
            timezone,
        }
    }

    pub async fn trigger_agenda(&self) -> anyhow::Result<()> {
        let tasks = self
            .tasks
            .list_all()
            .await
            .context("cant get tasks list")?;
        let tasks = TaskFilter::default().apply(tasks);
        let groups = build_agenda(&tasks, Utc::now(), self.timezone);

        info!(
            tasks = groups.iter().map(|g| g.tasks.len()).sum::<usize>(),
            "sending agenda"
        );

        let message = render_agenda(&groups, self.timezone);
        self.sink
            .send(&message, SendOptions::default().with_alert())
            .await
            .context("cant send agenda")
    }
}

/// Groups tasks with a due date by calendar day in `tz`
pub fn build_agenda(tasks: &[Task], now: DateTime<Utc>, tz: Tz) -> Vec<TaskGroup> {
    let today = now.with_timezone(&tz).date_naive();
    let week_end = today + Duration::days(7);
    let due_day = |task: &Task| -> Option<NaiveDate> {
        task.due.map(|due| due.with_timezone(&tz).date_naive())
    };

    let mut today_tasks = Vec::new();
    let mut week_tasks = Vec::new();
    let mut overdue_tasks = Vec::new();

    for task in tasks {
        let Some(day) = due_day(task) else {
            continue;
        };
        if day == today {
            today_tasks.push(task.clone());
        } else if day < today {
            overdue_tasks.push(task.clone());
        } else if day <= week_end {
            week_tasks.push(task.clone());
        }
    }

    for group in [&mut today_tasks, &mut week_tasks, &mut overdue_tasks] {
        group.sort_by(|a, b| {
            a.due
                .cmp(&b.due)
                .then(a.project.cmp(&b.project))
                .then(a.created_at.cmp(&b.created_at))
        });
    }

    vec![
        TaskGroup {
            title: "Today",
            tasks: today_tasks,
        },
        TaskGroup {
            title: "Next 7 days",
            tasks: week_tasks,
        },
        TaskGroup {
            title: "Overdue",
            tasks: overdue_tasks,
        },
    ]
}

pub fn render_agenda(groups: &[TaskGroup], tz: Tz) -> String {
    let mut out = String::from("Agenda");
    for group in groups {
        out.push_str(&format!("\n\n{} ({})", group.title, group.tasks.len()));
        for task in &group.tasks {
            let due = task
                .due
                .map(|due| due.with_timezone(&tz).format(" %d.%m %H:%M").to_string())
                .unwrap_or_default();
            out.push_str(&format!("\n- {}{}", task.description, due));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::notification_service::tests::RecordingSink;
    use crate::infrastructure::repositories::JsonTaskRepository;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn groups_by_due_day() {
        let tasks = vec![
            Task::new("today").with_due(now() + Duration::hours(3)),
            Task::new("tomorrow").with_due(now() + Duration::days(1)),
            Task::new("far").with_due(now() + Duration::days(30)),
            Task::new("late").with_due(now() - Duration::days(2)),
            Task::new("undated"),
        ];

        let groups = build_agenda(&tasks, now(), chrono_tz::UTC);

        let names = |i: usize| -> Vec<&str> {
            groups[i].tasks.iter().map(|t| t.description.as_str()).collect()
        };
        assert_eq!(groups[0].title, "Today");
        assert_eq!(names(0), vec!["today"]);
        assert_eq!(names(1), vec!["tomorrow"]);
        assert_eq!(names(2), vec!["late"]);
    }

    #[test]
    fn day_boundary_follows_timezone() {
        // 23:30 UTC on the 10th is already the 11th in Tokyo
        let due = Utc.with_ymd_and_hms(2024, 5, 10, 23, 30, 0).unwrap();
        let tasks = vec![Task::new("late night").with_due(due)];

        let utc_groups = build_agenda(&tasks, now(), chrono_tz::UTC);
        let tokyo_groups = build_agenda(&tasks, now(), chrono_tz::Asia::Tokyo);

        assert_eq!(utc_groups[0].tasks.len(), 1);
        assert_eq!(tokyo_groups[0].tasks.len(), 0);
        assert_eq!(tokyo_groups[1].tasks.len(), 1);
    }

    #[tokio::test]
    async fn trigger_sends_pending_tasks_with_alert() {
        let repo = Arc::new(JsonTaskRepository::in_memory());
        let sink = Arc::new(RecordingSink::default());
        repo.insert(Task::new("standup").with_due(Utc::now()))
            .await
            .unwrap();

        let service = AgendaService::new(repo, sink.clone(), chrono_tz::UTC);
        service.trigger_agenda().await.unwrap();

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.contains("standup"));
        assert!(sent[0].1.enable_alert);
        assert_eq!(sent[0].1.task_link, None);
    }
}
