use anyhow::Context;
use daily_notify::application::services::AgendaService;
use daily_notify::domain::repositories::{NotificationSink, TaskRepository};
use daily_notify::infrastructure::events::{ChangeBus, TrackedTaskRepository};
use daily_notify::infrastructure::notifications::{DiscordNotificationSink, LogNotificationSink};
use daily_notify::infrastructure::repositories::JsonTaskRepository;
use daily_notify::infrastructure::scheduler::{NotificationScheduler, RepeatingTimer, repeat_every_day_at};
use daily_notify::utils::{self, AppConfig};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv().ok();
    utils::setup_logging();

    if let Err(e) = run().await {
        error!("Error running notifier: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("cant load configuration")?;

    let store = JsonTaskRepository::open(&config.database_file)
        .await
        .with_context(|| format!("cant open task store {}", config.database_file.display()))?;
    info!(path = %config.database_file.display(), "task store opened");

    let bus = Arc::new(ChangeBus::new());
    let tasks: Arc<dyn TaskRepository> = Arc::new(TrackedTaskRepository::new(Arc::new(store), bus.clone()));

    let sink: Arc<dyn NotificationSink> = match &config.discord {
        Some(discord) => Arc::new(DiscordNotificationSink::new(
            &discord.token,
            discord.channel_id,
            config.public_url.clone(),
        )),
        None => {
            warn!("DISCORD_TOKEN not set, notifications go to the log");
            Arc::new(LogNotificationSink)
        }
    };

    let cancel = CancellationToken::new();
    let (stopper_tx, mut stopper_rx) = mpsc::unbounded_channel::<anyhow::Error>();

    let agenda_timer = match config.agenda.clone() {
        Some(agenda) => {
            let service = Arc::new(AgendaService::new(tasks.clone(), sink.clone(), agenda.timezone));
            let timer = RepeatingTimer::new(
                move || {
                    let service = service.clone();
                    async move { service.trigger_agenda().await }
                },
                repeat_every_day_at(agenda.at, agenda.timezone),
            );
            timer
                .start(&cancel, stopper_tx.clone())
                .context("cant start agenda timer")?;
            info!(at = %agenda.at, timezone = %agenda.timezone, "daily agenda enabled");
            Some(timer)
        }
        None => None,
    };

    let scheduler = Arc::new(NotificationScheduler::new(tasks, sink, bus));
    let mut scheduler_task = {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        let stopper = stopper_tx.clone();
        tokio::spawn(async move { scheduler.start(cancel, stopper).await })
    };
    drop(stopper_tx);

    let mut scheduler_done = false;
    let mut result = Ok(());
    tokio::select! {
        joined = &mut scheduler_task => {
            scheduler_done = true;
            result = match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("notification scheduler failed to start")),
                Err(e) => Err(anyhow::Error::new(e).context("notification scheduler panicked")),
            };
        }
        Some(err) = stopper_rx.recv() => {
            error!("stopping after fault: {:#}", err);
            result = Err(err);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down");
        }
    }

    cancel.cancel();
    if let Some(timer) = &agenda_timer {
        timer.stop();
    }
    scheduler.stop();

    if !scheduler_done {
        match tokio::time::timeout(config.shutdown_timeout, scheduler_task).await {
            Ok(Ok(Err(e))) => warn!("notification scheduler: {}", e),
            Ok(Err(e)) => warn!("notification scheduler task failed: {}", e),
            Ok(Ok(Ok(()))) => {}
            Err(_) => warn!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "notification scheduler did not stop in time"
            ),
        }
    }

    while let Ok(err) = stopper_rx.try_recv() {
        if result.is_ok() {
            result = Err(err);
        } else {
            error!("additional fault: {:#}", err);
        }
    }

    info!("notifier stopped");
    result
}
