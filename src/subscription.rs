use async_trait::async_trait;
use teloxide::{
    prelude::Requester,
    types::{Recipient, UserId},
    Bot,
};

use crate::error::BoxError;

/// Answers whether a user currently belongs to the gating channel. Asked on
/// every check: membership changes outside the bot's control.
#[async_trait]
pub trait SubscriptionOracle: Send + Sync {
    async fn is_subscribed(&self, user: UserId) -> Result<bool, BoxError>;
}

pub struct ChannelOracle {
    bot: Bot,
    channel: Recipient,
}

impl ChannelOracle {
    pub fn new(bot: Bot, channel: Recipient) -> Self {
        Self { bot, channel }
    }
}

#[async_trait]
impl SubscriptionOracle for ChannelOracle {
    async fn is_subscribed(&self, user: UserId) -> Result<bool, BoxError> {
        let member = self.bot.get_chat_member(self.channel.clone(), user).await?;
        Ok(member.kind.is_present())
    }
}
