use chrono::NaiveTime;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscordConfig {
    pub token: String,
    pub channel_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgendaConfig {
    pub at: NaiveTime,
    pub timezone: Tz,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_file: PathBuf,
    pub public_url: String,
    pub discord: Option<DiscordConfig>,
    pub agenda: Option<AgendaConfig>,
    pub shutdown_timeout: Duration,
}

impl AppConfig {
    /// Reads the process environment (call `dotenvy::dotenv()` first to pick up `.env`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_file = get("DATABASE_FILE").unwrap_or_else(|| "tasks.json".to_string());
        let public_url = get("PUBLIC_URL").unwrap_or_else(|| "http://127.0.0.1:8080".to_string());

        let discord = match (get("DISCORD_TOKEN"), get("NOTIFY_CHANNEL_ID")) {
            (Some(token), Some(channel)) => Some(DiscordConfig {
                token,
                channel_id: channel.parse().map_err(|e| ConfigError::Invalid {
                    key: "NOTIFY_CHANNEL_ID",
                    reason: format!("{}", e),
                })?,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Incomplete("DISCORD_TOKEN", "NOTIFY_CHANNEL_ID")),
            (None, Some(_)) => return Err(ConfigError::Incomplete("NOTIFY_CHANNEL_ID", "DISCORD_TOKEN")),
        };

        let agenda_enabled = match get("AGENDA_ENABLED") {
            Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::Invalid {
                key: "AGENDA_ENABLED",
                reason: format!("expected true/false, got {}", value),
            })?,
            None => false,
        };
        let agenda = if agenda_enabled {
            let at = parse_time(&get("AGENDA_AT").unwrap_or_else(|| "09:00".to_string()))?;
            let timezone = get("AGENDA_TIMEZONE")
                .unwrap_or_else(|| "UTC".to_string())
                .parse::<Tz>()
                .map_err(|e| ConfigError::Invalid {
                    key: "AGENDA_TIMEZONE",
                    reason: e.to_string(),
                })?;
            Some(AgendaConfig { at, timezone })
        } else {
            None
        };

        let shutdown_timeout = match get("SHUTDOWN_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(value.parse().map_err(|e| ConfigError::Invalid {
                key: "SHUTDOWN_TIMEOUT_SECS",
                reason: format!("{}", e),
            })?),
            None => Duration::from_secs(30),
        };

        Ok(Self {
            database_file: PathBuf::from(database_file),
            public_url,
            discord,
            agenda,
            shutdown_timeout,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| ConfigError::Invalid {
            key: "AGENDA_AT",
            reason: format!("{} ({})", value, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();

        assert_eq!(cfg.database_file, PathBuf::from("tasks.json"));
        assert_eq!(cfg.public_url, "http://127.0.0.1:8080");
        assert!(cfg.discord.is_none());
        assert!(cfg.agenda.is_none());
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn agenda_settings_are_parsed() {
        let cfg = config(&[
            ("AGENDA_ENABLED", "true"),
            ("AGENDA_AT", "07:45"),
            ("AGENDA_TIMEZONE", "Europe/Madrid"),
        ])
        .unwrap();

        let agenda = cfg.agenda.unwrap();
        assert_eq!(agenda.at, NaiveTime::from_hms_opt(7, 45, 0).unwrap());
        assert_eq!(agenda.timezone, chrono_tz::Europe::Madrid);
    }

    #[test]
    fn discord_needs_token_and_channel() {
        assert_eq!(
            config(&[("DISCORD_TOKEN", "abc")]).unwrap_err(),
            ConfigError::Incomplete("DISCORD_TOKEN", "NOTIFY_CHANNEL_ID")
        );

        let cfg = config(&[("DISCORD_TOKEN", "abc"), ("NOTIFY_CHANNEL_ID", "123")]).unwrap();
        assert_eq!(
            cfg.discord,
            Some(DiscordConfig {
                token: "abc".into(),
                channel_id: 123
            })
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("AGENDA_ENABLED", "maybe")]).is_err());
        assert!(config(&[("AGENDA_ENABLED", "1"), ("AGENDA_AT", "25:00")]).is_err());
        assert!(config(&[("AGENDA_ENABLED", "1"), ("AGENDA_TIMEZONE", "Mars/Base")]).is_err());
        assert!(config(&[("NOTIFY_CHANNEL_ID", "x"), ("DISCORD_TOKEN", "t")]).is_err());
    }
}
