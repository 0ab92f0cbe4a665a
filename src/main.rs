use std::error::Error;
use std::sync::Arc;

use rusttestbot::config::Config;
use rusttestbot::database::{connection::Connection, memory::MemoryStore, Store};
use rusttestbot::lifecycle::TestManager;
use rusttestbot::notifier::{Notifier, TelegramNotifier};
use rusttestbot::registration::Registrar;
use rusttestbot::schema::schema;
use rusttestbot::state::Session;
use rusttestbot::subscription::{ChannelOracle, SubscriptionOracle};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Arc::new(Config::from_env()?);
    init_tracing(&config.log_level)?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let connection = Connection::connect(url).await?;
            connection.migrate().await?;
            Arc::new(connection)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, data will not survive a restart.");
            Arc::new(MemoryStore::new())
        }
    };

    let bot = Bot::new(config.bot_token.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone()));
    let oracle: Arc<dyn SubscriptionOracle> =
        Arc::new(ChannelOracle::new(bot.clone(), config.channel.clone()));
    let registrar = Arc::new(Registrar::new(store.clone(), oracle));
    let manager = Arc::new(TestManager::new(store, notifier, config.retry_cap));

    tracing::info!("Starting bot...");

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![
            InMemStorage::<Session>::new(),
            registrar,
            manager,
            config.clone()
        ])
        .enable_ctrlc_handler()
        .build();

    if let Some(webhook) = &config.webhook {
        let listener = webhooks::axum(bot, Options::new(webhook.addr, webhook.url.clone())).await?;
        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await
    } else {
        dispatcher.dispatch().await
    }

    Ok(())
}

fn init_tracing(level: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_line_number(true)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    // teloxide logs through `log`.
    tracing_log::LogTracer::init()?;
    Ok(())
}
