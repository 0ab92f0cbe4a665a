use std::sync::Arc;

use teloxide::{
    payloads::{AnswerCallbackQuerySetters, SendMessageSetters},
    prelude::Requester,
    types::{CallbackQuery, ChatId, InlineKeyboardMarkup, Message, ParseMode, UserId},
    utils::command::BotCommands,
    Bot,
};
use tracing::{error, info, instrument};

use crate::{
    commands::{Command, TestAction, TextCommand},
    config::Config,
    database::model::User,
    error::{BoxError, QuizError, StoreError},
    keyboard::subscribe_keyboard,
    lifecycle::TestManager,
    messages,
    registration::{Access, Registrar, Reply, Transition},
    state::Session,
    HandlerResult, UserDialogue,
};

/// The bot is used in private chats only, where the chat id is the user id.
fn sender(msg: &Message) -> Option<UserId> {
    msg.chat.id.as_user()
}

async fn send_html(
    bot: &Bot,
    chat: ChatId,
    text: String,
    markup: Option<InlineKeyboardMarkup>,
) -> HandlerResult {
    let request = bot.send_message(chat, text).parse_mode(ParseMode::Html);
    match markup {
        Some(markup) => request.reply_markup(markup).await?,
        None => request.await?,
    };
    Ok(())
}

async fn send_reply(bot: &Bot, chat: ChatId, reply: Reply, config: &Config) -> HandlerResult {
    let markup = match reply {
        Reply::SubscribePrompt => Some(subscribe_keyboard(&config.channel_url)),
        _ => None,
    };
    send_html(
        bot,
        chat,
        messages::registration(reply, &config.channel_label()),
        markup,
    )
    .await
}

/// Stores the next session (removing it once the flow completes) and sends
/// the replies of a registration step.
async fn apply(
    bot: &Bot,
    chat: ChatId,
    dialogue: &UserDialogue,
    current: &Session,
    transition: Transition,
    config: &Config,
) -> HandlerResult {
    if transition.next != *current {
        match transition.next {
            Session::Idle => dialogue.exit().await?,
            next => dialogue.update(next).await?,
        }
    }
    for reply in transition.replies {
        send_reply(bot, chat, reply, config).await?;
    }
    Ok(())
}

async fn storage_failure(bot: &Bot, chat: ChatId, err: StoreError) -> HandlerResult {
    error!(chat = %chat, %err, "Storage fault while handling request");
    send_html(bot, chat, messages::STORAGE_APOLOGY.to_owned(), None).await
}

async fn run_transition(
    bot: &Bot,
    chat: ChatId,
    dialogue: &UserDialogue,
    current: &Session,
    config: &Config,
    step: Result<Transition, StoreError>,
) -> HandlerResult {
    match step {
        Ok(transition) => apply(bot, chat, dialogue, current, transition, config).await,
        Err(err) => storage_failure(bot, chat, err).await,
    }
}

async fn respond(bot: &Bot, chat: ChatId, result: Result<String, QuizError>) -> HandlerResult {
    let text = match result {
        Ok(text) => text,
        Err(err) => {
            match &err {
                QuizError::Storage(fault) => {
                    error!(chat = %chat, %fault, "Storage fault while handling request")
                }
                rejection => info!(chat = %chat, %rejection, "Request rejected"),
            }
            messages::rejection(&err)
        }
    };
    send_html(bot, chat, text, None).await
}

/// Runs the registration gate; `None` means the user was redirected.
async fn gate(
    bot: &Bot,
    chat: ChatId,
    user: UserId,
    dialogue: &UserDialogue,
    current: &Session,
    registrar: &Registrar,
    config: &Config,
) -> Result<Option<User>, BoxError> {
    match registrar.ensure_active(user).await {
        Ok(Access::Granted(record)) => Ok(Some(record)),
        Ok(Access::Redirect(transition)) => {
            apply(bot, chat, dialogue, current, transition, config).await?;
            Ok(None)
        }
        Err(err) => {
            storage_failure(bot, chat, err).await?;
            Ok(None)
        }
    }
}

#[instrument(level = "info", skip_all, fields(chat = %msg.chat.id))]
pub(crate) async fn start(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    session: Session,
    registrar: Arc<Registrar>,
    config: Arc<Config>,
) -> HandlerResult {
    let Some(user) = sender(&msg) else {
        return Ok(());
    };
    let step = registrar.first_contact(user).await;
    run_transition(&bot, msg.chat.id, &dialogue, &session, &config, step).await
}

pub(crate) async fn help(bot: Bot, msg: Message) -> HandlerResult {
    let text = format!(
        "{}\n\n{}",
        messages::help(),
        teloxide::utils::html::escape(&Command::descriptions().to_string())
    );
    send_html(&bot, msg.chat.id, text, None).await
}

#[instrument(level = "info", skip_all, fields(chat = %msg.chat.id))]
pub(crate) async fn receive_name(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    session: Session,
    registrar: Arc<Registrar>,
    config: Arc<Config>,
) -> HandlerResult {
    let Some(user) = sender(&msg) else {
        return Ok(());
    };
    match msg.text() {
        Some(name) => {
            let step = registrar.submit_name(user, name).await;
            run_transition(&bot, msg.chat.id, &dialogue, &session, &config, step).await
        }
        None => send_reply(&bot, msg.chat.id, Reply::AskName, &config).await,
    }
}

#[instrument(level = "info", skip_all, fields(chat = %msg.chat.id))]
pub(crate) async fn rename(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    session: Session,
    registrar: Arc<Registrar>,
    config: Arc<Config>,
    name: String,
) -> HandlerResult {
    let Some(user) = sender(&msg) else {
        return Ok(());
    };
    let step = registrar.rename(user, &name, session.clone()).await;
    run_transition(&bot, msg.chat.id, &dialogue, &session, &config, step).await
}

pub(crate) async fn remind_subscription(
    bot: Bot,
    msg: Message,
    config: Arc<Config>,
) -> HandlerResult {
    send_reply(&bot, msg.chat.id, Reply::SubscribePrompt, &config).await
}

#[instrument(level = "info", skip_all, fields(chat = %msg.chat.id))]
pub(crate) async fn my_info(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    session: Session,
    registrar: Arc<Registrar>,
    config: Arc<Config>,
) -> HandlerResult {
    let Some(user) = sender(&msg) else {
        return Ok(());
    };
    let chat = msg.chat.id;
    if let Some(record) = gate(&bot, chat, user, &dialogue, &session, &registrar, &config).await? {
        send_html(&bot, chat, messages::profile(&record), None).await?;
    }
    Ok(())
}

/// Everything an active user types that is not a slash command.
#[instrument(level = "info", skip_all, fields(chat = %msg.chat.id))]
pub(crate) async fn active_message(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    session: Session,
    registrar: Arc<Registrar>,
    manager: Arc<TestManager>,
    config: Arc<Config>,
) -> HandlerResult {
    let Some(user) = sender(&msg) else {
        return Ok(());
    };
    let chat = msg.chat.id;
    let Some(record) = gate(&bot, chat, user, &dialogue, &session, &registrar, &config).await?
    else {
        return Ok(());
    };

    let result = match msg.text().and_then(TextCommand::parse) {
        Some(TextCommand::CreateTest {
            subject,
            answer_key,
        }) => manager
            .create_test(&subject, &answer_key, user)
            .await
            .map(|test| messages::test_created(&test)),
        Some(TextCommand::Submit { code, answers }) => manager
            .submit_answers(code, user, &answers)
            .await
            .map(|submitted| messages::receipt(&submitted.receipt)),
        Some(TextCommand::MyInfo) => Ok(messages::profile(&record)),
        Some(TextCommand::Malformed(reason)) => Err(QuizError::InvalidFormat(reason)),
        Some(TextCommand::Rename { name }) => {
            let step = registrar.rename(user, &name, session.clone()).await;
            return run_transition(&bot, chat, &dialogue, &session, &config, step).await;
        }
        None => {
            info!(user = user.0, text = ?msg.text(), "Unrecognised input");
            Ok(messages::INVALID_INPUT.to_owned())
        }
    };
    respond(&bot, chat, result).await
}

#[instrument(level = "info", skip_all, fields(user = q.from.id.0))]
pub(crate) async fn confirm_subscription(
    bot: Bot,
    q: CallbackQuery,
    dialogue: UserDialogue,
    session: Session,
    registrar: Arc<Registrar>,
    config: Arc<Config>,
) -> HandlerResult {
    let user = q.from.id;
    let chat = ChatId::from(user);
    match registrar.confirm_subscription(user).await {
        Ok(mut transition) => {
            let answer = bot.answer_callback_query(q.id.clone());
            match transition
                .replies
                .iter()
                .position(|reply| *reply == Reply::SubscriptionMissing)
            {
                Some(pos) => {
                    transition.replies.remove(pos);
                    let text = messages::registration(
                        Reply::SubscriptionMissing,
                        &config.channel_label(),
                    );
                    answer.text(text).show_alert(true).await?;
                }
                None => {
                    answer.await?;
                }
            }
            apply(&bot, chat, &dialogue, &session, transition, &config).await
        }
        Err(err) => {
            bot.answer_callback_query(q.id.clone()).await?;
            storage_failure(&bot, chat, err).await
        }
    }
}

#[instrument(level = "info", skip_all, fields(user = q.from.id.0))]
pub(crate) async fn test_action(
    bot: Bot,
    q: CallbackQuery,
    action: TestAction,
    dialogue: UserDialogue,
    session: Session,
    registrar: Arc<Registrar>,
    manager: Arc<TestManager>,
    config: Arc<Config>,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    let user = q.from.id;
    let chat = ChatId::from(user);
    if gate(&bot, chat, user, &dialogue, &session, &registrar, &config)
        .await?
        .is_none()
    {
        return Ok(());
    }

    let result = match &action {
        TestAction::Status(test) => manager
            .view_status(user, test.code)
            .await
            .map(|standings| messages::status(&standings.test, &standings.entries)),
        TestAction::Finish { test, answer_key } => manager
            .finish_test(user, test.code, answer_key.as_deref())
            .await
            .map(|results| results.message),
    };
    respond(&bot, chat, result).await
}

pub(crate) async fn unknown_callback(bot: Bot, q: CallbackQuery) -> HandlerResult {
    info!(user = q.from.id.0, data = ?q.data, "Unknown callback payload");
    bot.answer_callback_query(q.id).await?;
    Ok(())
}
