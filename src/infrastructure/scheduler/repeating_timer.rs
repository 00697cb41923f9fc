use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::one_shot_timer::{OneShotTimer, TimerCompletion, TimerError, TimerOutcome};

type RepeatingAction = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type NextFireFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RepeatingTimerError {
    #[error("cant start timer: {0}")]
    Start(#[from] TimerError),
    #[error("next fire instant {0} was already in the past")]
    Expired(DateTime<Utc>),
    #[error("repeating action failed: {0}")]
    Action(#[source] anyhow::Error),
}

/// Re-arms a fresh [`OneShotTimer`] after every successful run
pub struct RepeatingTimer {
    action: RepeatingAction,
    next_fire_at: NextFireFn,
    cancel: CancellationToken,
}

impl RepeatingTimer {
    pub fn new<F, Fut, N>(action: F, next_fire_at: N) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
        N: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(move || action().boxed()),
            next_fire_at: Arc::new(next_fire_at),
            cancel: CancellationToken::new(),
        }
    }

    /// Arms the first timer and keeps re-arming until `parent` or [`stop`](Self::stop) cancels.
    ///
    /// A failing action or a timer that cannot be armed ends the loop; the error is
    /// pushed to `stopper`.
    pub fn start(
        &self,
        parent: &CancellationToken,
        stopper: mpsc::UnboundedSender<anyhow::Error>,
    ) -> Result<JoinHandle<()>, RepeatingTimerError> {
        let action = self.action.clone();
        let next_fire_at = self.next_fire_at.clone();
        let cancel = self.cancel.clone();
        let parent = parent.clone();

        let (mut timer, mut completion) = Self::arm(&action, &next_fire_at)?;
        debug!(fire_at = %timer.fire_at(), "repeating timer armed");

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        timer.stop();
                        return;
                    }
                    _ = parent.cancelled() => {
                        timer.stop();
                        return;
                    }
                    outcome = completion.wait() => {
                        let failure = match outcome {
                            TimerOutcome::Fired(Ok(())) => None,
                            TimerOutcome::Fired(Err(e)) => Some(RepeatingTimerError::Action(e)),
                            TimerOutcome::Expired => Some(RepeatingTimerError::Expired(timer.fire_at())),
                            TimerOutcome::ForceStopped => return,
                        };
                        if let Some(err) = failure {
                            warn!("repeating timer stopped: {}", err);
                            let _ = stopper.send(anyhow::Error::new(err));
                            return;
                        }
                        match Self::arm(&action, &next_fire_at) {
                            Ok((next_timer, next_completion)) => {
                                debug!(fire_at = %next_timer.fire_at(), "repeating timer re-armed");
                                timer = next_timer;
                                completion = next_completion;
                            }
                            Err(err) => {
                                let _ = stopper.send(anyhow::Error::new(err));
                                return;
                            }
                        }
                    }
                }
            }
        }))
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn arm(
        action: &RepeatingAction,
        next_fire_at: &NextFireFn,
    ) -> Result<(OneShotTimer, TimerCompletion), RepeatingTimerError> {
        let action = action.clone();
        let timer = OneShotTimer::new(next_fire_at(), move || action());
        let completion = timer.start()?;
        Ok((timer, completion))
    }
}

/// Next-instant function firing every day at `at` wall-clock time in `tz`
pub fn repeat_every_day_at(at: NaiveTime, tz: Tz) -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
    move || next_daily_instant(Utc::now(), at, tz)
}

/// Today at `at` in `tz`, or the next day when that moment has already passed
pub fn next_daily_instant(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let mut date = now.with_timezone(&tz).date_naive();
    // a DST gap can swallow the wall-clock time for one day
    for _ in 0..3 {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate >= now {
                return candidate;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    now + Duration::days(1)
}
