use std::sync::Arc;

use chrono::Utc;
use teloxide::types::UserId;
use tracing::{info, instrument, warn};

use crate::{
    database::{model::User, Store},
    error::StoreError,
    state::Session,
    subscription::SubscriptionOracle,
};

/// What the user should be told after a registration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Welcome,
    AskName,
    NameSaved,
    RenameUsage,
    SubscribePrompt,
    SubscriptionMissing,
    SubscriptionConfirmed,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Session,
    pub replies: Vec<Reply>,
}

impl Transition {
    fn to(next: Session, replies: impl Into<Vec<Reply>>) -> Self {
        Self {
            next,
            replies: replies.into(),
        }
    }
}

/// Outcome of gating an action that needs an active user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted(User),
    Redirect(Transition),
}

/// Drives `Unregistered → AwaitingName → AwaitingSubscription → Active`.
pub struct Registrar {
    store: Arc<dyn Store>,
    oracle: Arc<dyn SubscriptionOracle>,
}

impl Registrar {
    pub fn new(store: Arc<dyn Store>, oracle: Arc<dyn SubscriptionOracle>) -> Self {
        Self { store, oracle }
    }

    /// Oracle faults count as "not subscribed".
    async fn subscribed(&self, user: UserId) -> bool {
        match self.oracle.is_subscribed(user).await {
            Ok(subscribed) => subscribed,
            Err(err) => {
                warn!(user = user.0, %err, "Subscription check failed");
                false
            }
        }
    }

    fn gate_transition(subscribed: bool) -> Transition {
        if subscribed {
            Transition::to(Session::Idle, [Reply::Help])
        } else {
            Transition::to(Session::AwaitingSubscription, [Reply::SubscribePrompt])
        }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn first_contact(&self, user: UserId) -> Result<Transition, StoreError> {
        if self.store.get_user(user).await?.is_none() {
            return Ok(Transition::to(
                Session::AwaitingName,
                [Reply::Welcome, Reply::AskName],
            ));
        }
        Ok(Self::gate_transition(self.subscribed(user).await))
    }

    /// Stores the name, then routes to the subscription gate or straight to
    /// the active state.
    #[instrument(level = "info", skip(self))]
    pub async fn submit_name(&self, user: UserId, name: &str) -> Result<Transition, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Transition::to(Session::AwaitingName, [Reply::AskName]));
        }

        self.store.upsert_user(user, name, Utc::now()).await?;
        info!(user = user.0, name, "User name stored");

        let mut transition = Self::gate_transition(self.subscribed(user).await);
        transition.replies.insert(0, Reply::NameSaved);
        Ok(transition)
    }

    /// `fio*<name>` is accepted in every state, including before the user has
    /// ever been asked for a name. A blank name from a registered user leaves
    /// `current` as it is.
    #[instrument(level = "info", skip(self))]
    pub async fn rename(
        &self,
        user: UserId,
        name: &str,
        current: Session,
    ) -> Result<Transition, StoreError> {
        if name.trim().is_empty() && self.store.get_user(user).await?.is_some() {
            return Ok(Transition::to(current, [Reply::RenameUsage]));
        }
        self.submit_name(user, name).await
    }

    #[instrument(level = "info", skip(self))]
    pub async fn confirm_subscription(&self, user: UserId) -> Result<Transition, StoreError> {
        if self.store.get_user(user).await?.is_none() {
            return self.first_contact(user).await;
        }
        if !self.subscribed(user).await {
            return Ok(Transition::to(
                Session::AwaitingSubscription,
                [Reply::SubscriptionMissing],
            ));
        }
        Ok(Transition::to(
            Session::Idle,
            [Reply::SubscriptionConfirmed, Reply::Help],
        ))
    }

    /// Lets an action through only for a registered, subscribed user;
    /// everyone else is sent back into the flow.
    pub async fn ensure_active(&self, user: UserId) -> Result<Access, StoreError> {
        let Some(record) = self.store.get_user(user).await? else {
            return Ok(Access::Redirect(Transition::to(
                Session::AwaitingName,
                [Reply::Welcome, Reply::AskName],
            )));
        };
        if !self.subscribed(user).await {
            info!(user = user.0, "Active action from unsubscribed user");
            return Ok(Access::Redirect(Transition::to(
                Session::AwaitingSubscription,
                [Reply::SubscribePrompt],
            )));
        }
        Ok(Access::Granted(record))
    }
}
