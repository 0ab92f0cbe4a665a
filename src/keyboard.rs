use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::commands::{TestAction, CHECK_SUBSCRIPTION};

pub(crate) fn subscribe_keyboard(channel_url: &Url) -> InlineKeyboardMarkup {
    let keyboard = vec![
        vec![InlineKeyboardButton::url("Go to the channel📢", channel_url.clone())],
        vec![InlineKeyboardButton::callback(
            "Check subscription✔️",
            CHECK_SUBSCRIPTION,
        )],
    ];

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn test_actions_keyboard(actions: &[TestAction]) -> InlineKeyboardMarkup {
    let keyboard = actions
        .iter()
        .map(|action| vec![InlineKeyboardButton::callback(action.label(), action.encode())]);

    InlineKeyboardMarkup::new(keyboard)
}
