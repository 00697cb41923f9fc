pub mod notification_scheduler;
pub mod one_shot_timer;
pub mod repeating_timer;

pub use notification_scheduler::{NotificationScheduler, SchedulerError, TimerEntry};
pub use one_shot_timer::{OneShotTimer, TimerCompletion, TimerError, TimerOutcome};
pub use repeating_timer::{RepeatingTimer, RepeatingTimerError, repeat_every_day_at};
