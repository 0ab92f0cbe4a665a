#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use rusttestbot::{
    commands::TestAction,
    database::{memory::MemoryStore, Store},
    error::BoxError,
    lifecycle::TestManager,
    notifier::{DeliveryError, Notifier},
    registration::Registrar,
    subscription::SubscriptionOracle,
};
use teloxide::types::UserId;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Sent {
    pub recipient: UserId,
    pub text: String,
    pub actions: Vec<TestAction>,
}

/// Records every delivered message; failures can be scripted per recipient.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    failures: Mutex<HashMap<UserId, VecDeque<DeliveryError>>>,
}

impl RecordingNotifier {
    pub async fn fail_next(&self, recipient: UserId, err: DeliveryError) {
        self.failures
            .lock()
            .await
            .entry(recipient)
            .or_default()
            .push_back(err);
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, recipient: UserId) -> Vec<Sent> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| s.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipient: UserId,
        text: &str,
        actions: &[TestAction],
    ) -> Result<(), DeliveryError> {
        if let Some(err) = self
            .failures
            .lock()
            .await
            .get_mut(&recipient)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        self.sent.lock().await.push(Sent {
            recipient,
            text: text.to_owned(),
            actions: actions.to_vec(),
        });
        Ok(())
    }
}

/// Channel membership that tests can flip at will.
#[derive(Default)]
pub struct FakeChannel {
    members: Mutex<HashSet<UserId>>,
    broken: Mutex<bool>,
}

impl FakeChannel {
    pub async fn join(&self, user: UserId) {
        self.members.lock().await.insert(user);
    }

    pub async fn leave(&self, user: UserId) {
        self.members.lock().await.remove(&user);
    }

    pub async fn break_down(&self) {
        *self.broken.lock().await = true;
    }
}

#[async_trait]
impl SubscriptionOracle for FakeChannel {
    async fn is_subscribed(&self, user: UserId) -> Result<bool, BoxError> {
        if *self.broken.lock().await {
            return Err("getChatMember failed".into());
        }
        Ok(self.members.lock().await.contains(&user))
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub channel: Arc<FakeChannel>,
    pub registrar: Registrar,
    pub manager: Arc<TestManager>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let channel = Arc::new(FakeChannel::default());
        let registrar = Registrar::new(store.clone(), channel.clone());
        let manager = Arc::new(TestManager::new(
            store.clone(),
            notifier.clone(),
            Duration::from_secs(5),
        ));
        Self {
            store,
            notifier,
            channel,
            registrar,
            manager,
        }
    }

    /// Registered and subscribed user.
    pub async fn active_user(&self, id: u64, name: &str) -> UserId {
        let user = UserId(id);
        self.store.upsert_user(user, name, Utc::now()).await.unwrap();
        self.channel.join(user).await;
        user
    }
}
