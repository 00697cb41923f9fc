use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Deferred work run by a timer once its instant is reached
pub type TimerAction = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timer is already running")]
    AlreadyRunning,
}

/// How a started timer resolved
#[derive(Debug)]
pub enum TimerOutcome {
    /// The instant was reached and the action ran with this result
    Fired(anyhow::Result<()>),
    /// The instant was already in the past when the timer was started
    Expired,
    /// The timer was stopped before its instant
    ForceStopped,
}

impl TimerOutcome {
    pub fn is_force_stopped(&self) -> bool {
        matches!(self, TimerOutcome::ForceStopped)
    }
}

/// Receiving half of a started timer; resolves exactly once
#[derive(Debug)]
pub struct TimerCompletion {
    rx: oneshot::Receiver<TimerOutcome>,
}

impl TimerCompletion {
    pub async fn wait(self) -> TimerOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            // the timer task went away without reporting (panic or runtime shutdown)
            Err(_) => TimerOutcome::Fired(Err(anyhow::anyhow!(
                "timer task ended before reporting an outcome"
            ))),
        }
    }
}

/// A cancelable action bound to a single absolute instant.
///
/// A timer can be started once. Stopping it before the instant resolves it as
/// [`TimerOutcome::ForceStopped`]; once the action has begun, stopping has no effect.
pub struct OneShotTimer {
    fire_at: DateTime<Utc>,
    action: Mutex<Option<TimerAction>>,
    started: AtomicBool,
    done: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl OneShotTimer {
    pub fn new<F, Fut>(fire_at: DateTime<Utc>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            fire_at,
            action: Mutex::new(Some(Box::new(move || action().boxed()))),
            started: AtomicBool::new(false),
            done: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn fire_at(&self) -> DateTime<Utc> {
        self.fire_at
    }

    /// Arms the timer on the current tokio runtime
    pub fn start(&self) -> Result<TimerCompletion, TimerError> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TimerError::AlreadyRunning);
        }

        let (tx, rx) = oneshot::channel();
        let now = Utc::now();
        if now > self.fire_at {
            self.done.store(true, Ordering::SeqCst);
            let _ = tx.send(TimerOutcome::Expired);
            return Ok(TimerCompletion { rx });
        }

        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(TimerError::AlreadyRunning)?;
        let delay = (self.fire_at - now).to_std().unwrap_or_default();
        let cancel = self.cancel.clone();
        let done = self.done.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => TimerOutcome::ForceStopped,
                _ = tokio::time::sleep(delay) => TimerOutcome::Fired(action().await),
            };
            done.store(true, Ordering::SeqCst);
            let _ = tx.send(outcome);
        });

        Ok(TimerCompletion { rx })
    }

    /// Requests cancellation; safe to call any number of times
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Whether `stop` has been requested
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for OneShotTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotTimer")
            .field("fire_at", &self.fire_at)
            .field("started", &self.is_started())
            .field("done", &self.is_done())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
