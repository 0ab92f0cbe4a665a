use std::{str::FromStr, sync::LazyLock};

use regex::Regex;
use teloxide::{types::Message, utils::command::BotCommands};
use thiserror::Error;

use crate::database::model::{TestCode, TestRef};

/// Callback payload of the "check my subscription" button.
pub const CHECK_SUBSCRIPTION: &str = "check_subscription";

/// Telegram rejects callback payloads longer than this many bytes.
const MAX_CALLBACK_DATA: usize = 64;

const RENAME_PREFIX: &str = "fio*";

static CREATE_TEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+test\*([^*]*)\*([^*]*)$").expect("valid regex"));
static SUBMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\*([^*]*)$").expect("valid regex"));

#[derive(Debug, Clone, BotCommands)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "start the bot or continue registration.")]
    Start,
    #[command(description = "display help.")]
    Help,
    #[command(description = "show your stored profile.")]
    MyInfo,
}

/// Plain-text commands recognised outside of slash commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCommand {
    Rename { name: String },
    CreateTest { subject: String, answer_key: String },
    Submit { code: TestCode, answers: String },
    MyInfo,
    /// Looks like a command but cannot be carried out as typed.
    Malformed(String),
}

impl TextCommand {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        if let Some(name) = text.strip_prefix(RENAME_PREFIX) {
            return Some(Self::Rename {
                name: title_case(name),
            });
        }
        if text.eq_ignore_ascii_case("myinfo") {
            return Some(Self::MyInfo);
        }
        if let Some(caps) = CREATE_TEST.captures(text) {
            return Some(Self::CreateTest {
                subject: caps[1].trim().to_owned(),
                answer_key: caps[2].trim().to_owned(),
            });
        }
        if let Some(caps) = SUBMIT.captures(text) {
            let Ok(code) = caps[1].parse() else {
                return Some(Self::Malformed(format!(
                    "test code {} is out of range.",
                    &caps[1]
                )));
            };
            return Some(Self::Submit {
                code,
                answers: caps[2].trim().to_owned(),
            });
        }
        None
    }

    pub fn from_message(msg: Message) -> Option<Self> {
        msg.text().and_then(Self::parse)
    }
}

/// Upper-cases the first letter of every word and lower-cases the rest.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Author follow-up actions. Each one carries its test triple so that it can
/// be acted on later without any server-side session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestAction {
    Status(TestRef),
    Finish {
        test: TestRef,
        answer_key: Option<String>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed callback payload: {0}")]
pub struct ParseActionError(String);

impl TestAction {
    pub fn test(&self) -> &TestRef {
        match self {
            TestAction::Status(test) | TestAction::Finish { test, .. } => test,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestAction::Status(_) => "Current status",
            TestAction::Finish { .. } => "Finish",
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            TestAction::Status(_) => "status",
            TestAction::Finish { .. } => "finish",
        }
    }

    /// Callback payload for this action, kept within Telegram's limit by
    /// dropping the answer key first and shortening the subject second.
    pub fn encode(&self) -> String {
        let test = self.test();
        let tail = format!("*{}*{}", test.code, test.question_count);
        let mut key = match self {
            TestAction::Finish {
                answer_key: Some(key),
                ..
            } => format!("*{key}"),
            _ => String::new(),
        };

        let fixed = self.kind().len() + 1 + tail.len();
        if fixed + test.subject.len() + key.len() > MAX_CALLBACK_DATA {
            key.clear();
        }
        let budget = MAX_CALLBACK_DATA.saturating_sub(fixed + key.len());
        let subject = truncate(&test.subject, budget);

        format!("{}*{subject}{tail}{key}", self.kind())
    }
}

fn truncate(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl FromStr for TestAction {
    type Err = ParseActionError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseActionError(data.to_owned());
        let parts: Vec<&str> = data.split('*').collect();

        let test_ref = |parts: &[&str]| -> Result<TestRef, ParseActionError> {
            Ok(TestRef {
                subject: parts[1].to_owned(),
                code: parts[2].parse().map_err(|_| malformed())?,
                question_count: parts[3].parse().map_err(|_| malformed())?,
            })
        };

        match parts.as_slice() {
            ["status", _, _, _] => Ok(TestAction::Status(test_ref(&parts[..])?)),
            ["finish", _, _, _] => Ok(TestAction::Finish {
                test: test_ref(&parts[..])?,
                answer_key: None,
            }),
            ["finish", _, _, _, key] => Ok(TestAction::Finish {
                test: test_ref(&parts[..])?,
                answer_key: Some((*key).to_owned()),
            }),
            _ => Err(malformed()),
        }
    }
}
