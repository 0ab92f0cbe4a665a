use teloxide::{
    dispatching::{dialogue, dialogue::InMemStorage, UpdateHandler},
    prelude::*,
    types::CallbackQuery,
};

use crate::{
    commands::{Command, TestAction, TextCommand, CHECK_SUBSCRIPTION},
    handlers,
    state::Session,
};

/// Dispatch tree: slash commands and the rename override work in every
/// state; everything else is routed by the registration session.
pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handlers::start))
        .branch(case![Command::Help].endpoint(handlers::help))
        .branch(case![Command::MyInfo].endpoint(handlers::my_info));

    let rename_handler = dptree::filter_map(TextCommand::from_message)
        .branch(case![TextCommand::Rename { name }].endpoint(handlers::rename));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(rename_handler)
        .branch(case![Session::AwaitingName].endpoint(handlers::receive_name))
        .branch(case![Session::AwaitingSubscription].endpoint(handlers::remind_subscription))
        .branch(case![Session::Idle].endpoint(handlers::active_message));

    let callback_handler = Update::filter_callback_query()
        .branch(
            dptree::filter(|q: CallbackQuery| q.data.as_deref() == Some(CHECK_SUBSCRIPTION))
                .endpoint(handlers::confirm_subscription),
        )
        .branch(
            dptree::filter_map(|q: CallbackQuery| {
                q.data.as_deref().and_then(|data| data.parse::<TestAction>().ok())
            })
            .endpoint(handlers::test_action),
        )
        .endpoint(handlers::unknown_callback);

    dialogue::enter::<Update, InMemStorage<Session>, Session, _>()
        .branch(message_handler)
        .branch(callback_handler)
}
