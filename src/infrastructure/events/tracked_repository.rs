use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::entities::task::{Task, TaskId};
use crate::domain::repositories::task_repository::{Result, TaskRepository};
use crate::infrastructure::events::change_bus::ChangeBus;

/// Task store wrapper that announces every successful write on the bus
pub struct TrackedTaskRepository {
    inner: Arc<dyn TaskRepository>,
    bus: Arc<ChangeBus>,
}

impl TrackedTaskRepository {
    pub fn new(inner: Arc<dyn TaskRepository>, bus: Arc<ChangeBus>) -> Self {
        Self { inner, bus }
    }
}

#[async_trait]
impl TaskRepository for TrackedTaskRepository {
    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        self.inner.get_by_id(id).await
    }

    async fn insert(&self, task: Task) -> Result<()> {
        self.inner.insert(task).await?;
        self.bus.publish();
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Task>> {
        self.inner.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::events::change_bus::ChangeSubscriber;
    use crate::infrastructure::repositories::json_task_repository::JsonTaskRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl ChangeSubscriber for Counter {
        fn on_change(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn publishes_only_after_successful_insert() {
        let bus = Arc::new(ChangeBus::new());
        let counter = Arc::new(Counter::default());
        bus.register(counter.clone());
        let repo = TrackedTaskRepository::new(Arc::new(JsonTaskRepository::in_memory()), bus);

        repo.insert(Task::new("write report")).await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        assert!(repo.insert(Task::new("")).await.is_err());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        repo.list_all().await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
