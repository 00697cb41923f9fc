//! Keeps exactly one reminder timer per pending task with a future notify instant.
//!
//! Every committed write to the task store triggers a reconciliation pass that
//! diffs the wanted timers against the running ones. Passes are serialized by
//! the `current_timers` lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::one_shot_timer::{OneShotTimer, TimerError, TimerOutcome};
use crate::application::services::notification_service::NotificationService;
use crate::domain::entities::task::{Task, TaskId};
use crate::domain::entities::task_filter::TaskFilter;
use crate::domain::repositories::{NotificationSink, RepositoryError, TaskRepository};
use crate::infrastructure::events::change_bus::{ChangeBus, ChangeSubscriber};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("cant get task list: {0}")]
    TaskSource(#[source] RepositoryError),
    #[error("cant spawn timer for task {task_id}: {source}")]
    TimerStart {
        task_id: TaskId,
        #[source]
        source: TimerError,
    },
    #[error("kept timer for task {0} is neither running nor done")]
    InconsistentState(TaskId),
    #[error("reminder for task {task_id} failed: {source:#}")]
    Delivery {
        task_id: TaskId,
        #[source]
        source: anyhow::Error,
    },
}

/// A running reminder timer for one task
#[derive(Debug, Clone)]
pub struct TimerEntry {
    pub task_id: TaskId,
    pub fire_at: DateTime<Utc>,
    pub timer: Arc<OneShotTimer>,
}

pub struct NotificationScheduler {
    tasks: Arc<dyn TaskRepository>,
    notifications: NotificationService,
    bus: Arc<ChangeBus>,
    current_timers: Mutex<HashMap<TaskId, TimerEntry>>,
    closed: AtomicBool,
    errors_tx: mpsc::UnboundedSender<SchedulerError>,
    errors_rx: Mutex<mpsc::UnboundedReceiver<SchedulerError>>,
    shutdown: CancellationToken,
}

impl NotificationScheduler {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        sink: Arc<dyn NotificationSink>,
        bus: Arc<ChangeBus>,
    ) -> Self {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        Self {
            notifications: NotificationService::new(tasks.clone(), sink),
            tasks,
            bus,
            current_timers: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            errors_tx,
            errors_rx: Mutex::new(errors_rx),
            shutdown: CancellationToken::new(),
        }
    }

    /// Runs the scheduler until `cancel`, [`stop`](Self::stop) or a fatal fault.
    ///
    /// Returns an error only when the initial pass fails. A fault hit while
    /// running is pushed to `error_sink` before this returns.
    pub async fn start(
        self: &Arc<Self>,
        cancel: CancellationToken,
        error_sink: mpsc::UnboundedSender<anyhow::Error>,
    ) -> Result<(), SchedulerError> {
        if let Err(err) = self.reconcile().await {
            self.close().await;
            return Err(err);
        }

        let listener: Arc<dyn ChangeSubscriber> = Arc::new(ChangeListener {
            scheduler: Arc::downgrade(self),
            runtime: Handle::current(),
        });
        self.bus.register(listener.clone());
        let timers = self.current_timers.lock().await.len();
        info!(timers, "notification scheduler started");

        let fault = {
            let mut errors = self.errors_rx.lock().await;
            tokio::select! {
                Some(err) = errors.recv() => Some(err),
                _ = cancel.cancelled() => None,
                _ = self.shutdown.cancelled() => None,
            }
        };

        self.bus.unregister(&listener);
        self.close().await;

        match fault {
            Some(err) => {
                error!("notification scheduler stopped: {}", err);
                let _ = error_sink.send(anyhow::Error::new(err));
            }
            None => info!("notification scheduler stopped"),
        }
        Ok(())
    }

    /// Requests shutdown of a running scheduler
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Re-reads the store and reconciles; failures land on the internal error queue
    pub async fn on_change(&self) {
        if let Err(err) = self.reconcile().await {
            warn!("refresh state failed: {}", err);
            let _ = self.errors_tx.send(err);
        }
    }

    /// One reconciliation pass converging running timers to the store's state
    pub async fn reconcile(&self) -> Result<(), SchedulerError> {
        let mut current = self.current_timers.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let tasks = self
            .tasks
            .list_all()
            .await
            .map_err(SchedulerError::TaskSource)?;
        let desired = desired_state(&TaskFilter::default().apply(tasks), Utc::now());

        let stale: Vec<TaskId> = current
            .keys()
            .filter(|id| !desired.contains_key(id))
            .copied()
            .collect();
        for task_id in stale {
            if let Some(entry) = current.remove(&task_id) {
                entry.timer.stop();
                debug!(task_id = %task_id, "reminder timer dropped");
            }
        }

        for (task_id, fire_at) in desired {
            let existing = current
                .get(&task_id)
                .map(|entry| (entry.fire_at, entry.timer.is_started() || entry.timer.is_done()));
            match existing {
                Some((current_at, live)) if current_at == fire_at => {
                    if !live {
                        return Err(SchedulerError::InconsistentState(task_id));
                    }
                }
                Some(_) => {
                    // start the replacement first so there is no window without a timer
                    let entry = self.spawn_timer(task_id, fire_at)?;
                    if let Some(old) = current.insert(task_id, entry) {
                        old.timer.stop();
                    }
                    debug!(task_id = %task_id, fire_at = %fire_at, "reminder timer rescheduled");
                }
                None => {
                    let entry = self.spawn_timer(task_id, fire_at)?;
                    current.insert(task_id, entry);
                    debug!(task_id = %task_id, fire_at = %fire_at, "reminder timer scheduled");
                }
            }
        }

        Ok(())
    }

    /// Snapshot of the running timers
    pub async fn active_timers(&self) -> HashMap<TaskId, TimerEntry> {
        self.current_timers.lock().await.clone()
    }

    fn spawn_timer(
        &self,
        task_id: TaskId,
        fire_at: DateTime<Utc>,
    ) -> Result<TimerEntry, SchedulerError> {
        let notifications = self.notifications.clone();
        let timer = Arc::new(OneShotTimer::new(fire_at, move || async move {
            notifications.send_task_reminder(task_id).await
        }));
        let completion = timer
            .start()
            .map_err(|source| SchedulerError::TimerStart { task_id, source })?;

        let errors = self.errors_tx.clone();
        tokio::spawn(async move {
            match completion.wait().await {
                TimerOutcome::Fired(Ok(())) | TimerOutcome::ForceStopped => {}
                TimerOutcome::Expired => {
                    debug!(task_id = %task_id, "reminder instant passed before the timer started");
                }
                TimerOutcome::Fired(Err(source)) => {
                    let _ = errors.send(SchedulerError::Delivery { task_id, source });
                }
            }
        });

        Ok(TimerEntry {
            task_id,
            fire_at,
            timer,
        })
    }

    /// Stops every timer without waiting for deliveries already underway
    async fn close(&self) {
        let mut current = self.current_timers.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        for (_, entry) in current.drain() {
            entry.timer.stop();
        }
    }
}

/// Fire instants wanted right now, keyed by task
fn desired_state(tasks: &[Task], now: DateTime<Utc>) -> HashMap<TaskId, DateTime<Utc>> {
    tasks
        .iter()
        .filter_map(|task| task.pending_reminder_after(now).map(|at| (task.id, at)))
        .collect()
}

/// Bus registration that moves reconciliation off the writer's path
struct ChangeListener {
    scheduler: Weak<NotificationScheduler>,
    runtime: Handle,
}

impl ChangeSubscriber for ChangeListener {
    fn on_change(&self) {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return;
        };
        self.runtime.spawn(async move {
            scheduler.on_change().await;
        });
    }
}
