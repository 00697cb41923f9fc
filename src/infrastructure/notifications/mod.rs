pub mod discord_sink;
pub mod log_sink;

pub use discord_sink::DiscordNotificationSink;
pub use log_sink::LogNotificationSink;
