use std::time::Duration;

use async_trait::async_trait;
use teloxide::{
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{ParseMode, UserId},
    ApiError, Bot, RequestError,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{commands::TestAction, keyboard::test_actions_keyboard};

/// Delivery never takes more than this many attempts per recipient.
pub const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("recipient unreachable: {0}")]
    Unreachable(String),
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),
    #[error("transient delivery fault: {0}")]
    Transient(String),
}

impl From<RequestError> for DeliveryError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RetryAfter(after) => Self::RateLimited(after.duration()),
            RequestError::Api(
                api @ (ApiError::BotBlocked | ApiError::ChatNotFound | ApiError::UserDeactivated),
            ) => Self::Unreachable(api.to_string()),
            other => Self::Transient(other.to_string()),
        }
    }
}

/// Best-effort outbound messaging keyed by user identity.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: UserId,
        text: &str,
        actions: &[TestAction],
    ) -> Result<(), DeliveryError>;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(
        &self,
        recipient: UserId,
        text: &str,
        actions: &[TestAction],
    ) -> Result<(), DeliveryError> {
        let mut request = self
            .bot
            .send_message(recipient, text)
            .parse_mode(ParseMode::Html);
        if !actions.is_empty() {
            request = request.reply_markup(test_actions_keyboard(actions));
        }
        request.await?;
        Ok(())
    }
}

/// Sends one message, waiting out a single rate-limit signal (capped at
/// `retry_cap`) before the second and last attempt.
pub async fn deliver(
    notifier: &dyn Notifier,
    recipient: UserId,
    text: &str,
    actions: &[TestAction],
    retry_cap: Duration,
) -> Result<(), DeliveryError> {
    let mut attempt = 1;
    loop {
        match notifier.send(recipient, text, actions).await {
            Err(DeliveryError::RateLimited(after)) if attempt < MAX_ATTEMPTS => {
                let wait = after.min(retry_cap);
                warn!(
                    recipient = recipient.0,
                    wait_secs = wait.as_secs(),
                    "Flood limit exceeded, retrying once"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<UserId>,
    pub failed: Vec<(UserId, DeliveryError)>,
}

/// Delivers `text` to every recipient independently; a failure is logged and
/// the fan-out moves on.
pub async fn broadcast(
    notifier: &dyn Notifier,
    recipients: &[UserId],
    text: &str,
    retry_cap: Duration,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for &recipient in recipients {
        match deliver(notifier, recipient, text, &[], retry_cap).await {
            Ok(()) => report.delivered.push(recipient),
            Err(err) => {
                error!(recipient = recipient.0, %err, "Broadcast delivery failed");
                report.failed.push((recipient, err));
            }
        }
    }
    report
}
