use std::{net::SocketAddr, time::Duration};

use teloxide::types::{ChatId, Recipient};
use thiserror::Error;
use url::Url;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_RETRY_CAP_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} should be set")]
    Missing(&'static str),
    #[error("{key} can't be parsed: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("WEBHOOK_URL and WEBHOOK_ADDR must be set together")]
    PartialWebhook,
}

#[derive(Debug, Clone)]
pub struct Webhook {
    pub url: Url,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub database_url: Option<String>,
    pub channel: Recipient,
    pub channel_url: Url,
    pub log_level: String,
    pub webhook: Option<Webhook>,
    pub retry_cap: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let bot_token = required("TELOXIDE_TOKEN")?;
        let channel_raw = required("CHANNEL")?;
        let channel = parse_channel(&channel_raw)?;

        let channel_url = match var("CHANNEL_URL") {
            Some(url) => parse_url("CHANNEL_URL", &url)?,
            None => match &channel {
                Recipient::ChannelUsername(name) => parse_url(
                    "CHANNEL",
                    &format!("https://t.me/{}", name.trim_start_matches('@')),
                )?,
                Recipient::Id(_) => return Err(ConfigError::Missing("CHANNEL_URL")),
            },
        };

        let webhook = match (var("WEBHOOK_URL"), var("WEBHOOK_ADDR")) {
            (Some(url), Some(addr)) => Some(Webhook {
                url: parse_url("WEBHOOK_URL", &url)?,
                addr: addr.parse().map_err(|err: std::net::AddrParseError| {
                    ConfigError::Invalid {
                        key: "WEBHOOK_ADDR",
                        reason: err.to_string(),
                    }
                })?,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialWebhook),
        };

        let retry_cap = match var("RETRY_CAP_SECS") {
            Some(secs) => secs.parse().map_err(|err: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key: "RETRY_CAP_SECS",
                    reason: err.to_string(),
                }
            })?,
            None => DEFAULT_RETRY_CAP_SECS,
        };

        Ok(Self {
            bot_token,
            database_url: var("DATABASE_URL"),
            channel,
            channel_url,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
            webhook,
            retry_cap: Duration::from_secs(retry_cap),
        })
    }

    /// Human-readable channel reference for prompts.
    pub fn channel_label(&self) -> String {
        match &self.channel {
            Recipient::ChannelUsername(name) => name.clone(),
            Recipient::Id(_) => self.channel_url.to_string(),
        }
    }
}

fn parse_channel(raw: &str) -> Result<Recipient, ConfigError> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    if raw.starts_with('@') && raw.len() > 1 {
        return Ok(Recipient::ChannelUsername(raw.to_owned()));
    }
    Err(ConfigError::Invalid {
        key: "CHANNEL",
        reason: format!("expected @username or a numeric chat id, got '{raw}'"),
    })
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|err: url::ParseError| ConfigError::Invalid {
        key,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = load(&[("TELOXIDE_TOKEN", "123:abc"), ("CHANNEL", "@RKKimyo")]).unwrap();

        assert_eq!(config.channel_url.as_str(), "https://t.me/RKKimyo");
        assert_eq!(config.channel_label(), "@RKKimyo");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.retry_cap, Duration::from_secs(30));
        assert!(config.database_url.is_none());
        assert!(config.webhook.is_none());
    }

    #[test]
    fn token_and_channel_are_required() {
        assert!(matches!(
            load(&[("CHANNEL", "@RKKimyo")]),
            Err(ConfigError::Missing("TELOXIDE_TOKEN"))
        ));
        assert!(matches!(
            load(&[("TELOXIDE_TOKEN", "123:abc")]),
            Err(ConfigError::Missing("CHANNEL"))
        ));
    }

    #[test]
    fn numeric_channel_needs_an_explicit_url() {
        assert!(matches!(
            load(&[("TELOXIDE_TOKEN", "t"), ("CHANNEL", "-1001234")]),
            Err(ConfigError::Missing("CHANNEL_URL"))
        ));
        let config = load(&[
            ("TELOXIDE_TOKEN", "t"),
            ("CHANNEL", "-1001234"),
            ("CHANNEL_URL", "https://t.me/+invite"),
        ])
        .unwrap();
        assert!(matches!(config.channel, Recipient::Id(ChatId(-1001234))));
    }

    #[test]
    fn webhook_must_be_fully_configured() {
        assert!(matches!(
            load(&[
                ("TELOXIDE_TOKEN", "t"),
                ("CHANNEL", "@c"),
                ("WEBHOOK_URL", "https://example.org/hook"),
            ]),
            Err(ConfigError::PartialWebhook)
        ));
        let config = load(&[
            ("TELOXIDE_TOKEN", "t"),
            ("CHANNEL", "@c"),
            ("WEBHOOK_URL", "https://example.org/hook"),
            ("WEBHOOK_ADDR", "0.0.0.0:8443"),
        ])
        .unwrap();
        assert_eq!(config.webhook.unwrap().addr.port(), 8443);
    }
}
