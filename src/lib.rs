use state::Session;
use teloxide::{dispatching::dialogue::InMemStorage, prelude::Dialogue};

pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod grader;
mod handlers;
mod keyboard;
pub mod lifecycle;
pub mod messages;
pub mod notifier;
pub mod registration;
pub mod schema;
pub mod state;
pub mod subscription;

type UserDialogue = Dialogue<Session, InMemStorage<Session>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;
