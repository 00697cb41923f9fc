use anyhow::Context;
use async_trait::async_trait;
use serenity::builder::{CreateActionRow, CreateButton, CreateEmbed, CreateMessage};
use serenity::http::Http;
use serenity::model::channel::MessageFlags;
use serenity::model::colour::Color;
use serenity::model::id::ChannelId;
use std::sync::Arc;

use crate::domain::entities::task::TaskId;
use crate::domain::repositories::{NotificationSink, SendOptions};

/// Posts reminders into a single Discord channel through the REST API
pub struct DiscordNotificationSink {
    http: Arc<Http>,
    channel_id: ChannelId,
    public_url: String,
}

impl DiscordNotificationSink {
    pub fn new(token: &str, channel_id: u64, public_url: impl Into<String>) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
            channel_id: ChannelId::new(channel_id),
            public_url: public_url.into(),
        }
    }

    /// Web page of a single task
    pub fn task_url(&self, task_id: TaskId) -> String {
        format!(
            "{}/task?uuid={}",
            self.public_url.trim_end_matches('/'),
            task_id
        )
    }

    fn build_message(&self, message: &str, options: SendOptions) -> CreateMessage {
        let embed = CreateEmbed::new()
            .description(message)
            .color(Color::from_rgb(66, 135, 245));

        let mut msg = CreateMessage::new().embed(embed);
        if !options.enable_alert {
            msg = msg.flags(MessageFlags::SUPPRESS_NOTIFICATIONS);
        }
        if let Some(task_id) = options.task_link {
            let button = CreateButton::new_link(self.task_url(task_id)).label("Task info");
            msg = msg.components(vec![CreateActionRow::Buttons(vec![button])]);
        }
        msg
    }
}

#[async_trait]
impl NotificationSink for DiscordNotificationSink {
    async fn send(&self, message: &str, options: SendOptions) -> anyhow::Result<()> {
        let msg = self.build_message(message, options);
        self.channel_id
            .send_message(&self.http, msg)
            .await
            .with_context(|| format!("discord send message to channel {}", self.channel_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_url_joins_without_double_slash() {
        let sink = DiscordNotificationSink::new("token", 42, "https://todo.example.com/");
        let id = uuid::Uuid::nil();

        assert_eq!(
            sink.task_url(id),
            "https://todo.example.com/task?uuid=00000000-0000-0000-0000-000000000000"
        );
    }
}
