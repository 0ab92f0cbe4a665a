//! HTML message templates. Anything typed by users is escaped here.

use teloxide::utils::html::{bold, code_inline, escape, italic};

use crate::{
    database::model::{Standing, TestRef, User},
    error::QuizError,
    lifecycle::{AuthorNotice, Receipt},
    registration::Reply,
};

const DATETIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

pub const STORAGE_APOLOGY: &str = "Sorry, something went wrong on our side. Please try again later.";

pub const INVALID_INPUT: &str = "Unable to handle the message. Enter /help to see usages.";

pub fn registration(reply: Reply, channel: &str) -> String {
    match reply {
        Reply::Welcome => "Welcome to the test bot!".to_owned(),
        Reply::AskName => bold("Send your first and last name to get started."),
        Reply::NameSaved => "Your details have been saved!".to_owned(),
        Reply::RenameUsage => format!(
            "The name must not be empty. Example: {}",
            code_inline("fio*Valijon Alijonov")
        ),
        Reply::SubscribePrompt => italic(&format!(
            "To use the bot you need to subscribe to {}.",
            escape(channel)
        )),
        Reply::SubscriptionMissing => "You need to subscribe to our channel first!".to_owned(),
        Reply::SubscriptionConfirmed => "Thanks for subscribing to our channel!".to_owned(),
        Reply::Help => help(),
    }
}

pub fn help() -> String {
    [
        bold("1️⃣ To create a test send"),
        code_inline("+test*Subject*correct answers"),
        bold("Example:"),
        code_inline("+test*Chemistry*abbccabd"),
        String::new(),
        bold("2️⃣ To answer a test send"),
        code_inline("test code*your answers"),
        bold("Example:"),
        code_inline("1234*abbcabcd"),
        String::new(),
        "Use /myinfo to see your profile.".to_owned(),
    ]
    .join("\n")
}

pub fn test_created(test: &TestRef) -> String {
    format!(
        "{}\n\nTest code: {}\nSubject: {}\nQuestions: {}\n\nParticipants can answer like this:\n\n{}",
        bold("✅ Test added!"),
        test.code,
        escape(&test.subject),
        test.question_count,
        code_inline(&format!(
            "{}*abcdab... ({} answers)",
            test.code, test.question_count
        )),
    )
}

pub fn receipt(receipt: &Receipt) -> String {
    format!(
        "{} {}\n📚 Subject: {}\n📖 Test code: {}\n✏ Questions: {}\n✅ Correct answers: {}\n🔣 Score: {:.1}%\n\n🕐 Submitted: {}",
        bold("👤 Participant:"),
        code_inline(&receipt.student_name),
        escape(&receipt.test.subject),
        bold(&receipt.test.code.to_string()),
        receipt.test.question_count,
        receipt.correct_count,
        receipt.ratio * 100.0,
        receipt.submitted_at.format(DATETIME_FORMAT),
    )
}

pub fn author_notice(notice: &AuthorNotice) -> String {
    format!(
        "{} submitted answers to the {} test {}",
        escape(&notice.student_name),
        escape(&notice.test.subject),
        notice.test.code,
    )
}

pub fn standings(test: &TestRef, standings: &[Standing]) -> String {
    let rows: Vec<String> = standings
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {} - {}", i + 1, escape(&s.name), s.correct_count))
        .collect();

    format!(
        "Subject: {}\nTest code: {}\nQuestions: {}\n\n✅ Results:\n\n{}",
        escape(&test.subject),
        test.code,
        test.question_count,
        rows.join("\n"),
    )
}

pub fn status(test: &TestRef, board: &[Standing]) -> String {
    format!("Test status.\n\n{}", standings(test, board))
}

pub fn final_results(test: &TestRef, board: &[Standing], answer_key: &str) -> String {
    let key: Vec<String> = answer_key
        .chars()
        .enumerate()
        .map(|(i, answer)| format!("{}.{}", i + 1, answer))
        .collect();

    format!(
        "🔐 Test finished.\n\n{}\n\nCorrect answers:\n{}",
        standings(test, board),
        key.join(" "),
    )
}

pub fn profile(user: &User) -> String {
    format!(
        "{}\n\n👤 Name: {}\nRegistered: {}\n\nTo change your name send\n{}\n{}\n{}",
        bold("Your details:"),
        code_inline(&user.name),
        user.joined_at.format(DATETIME_FORMAT),
        code_inline("fio*First Last"),
        bold("Example:"),
        code_inline("fio*Valijon Alijonov"),
    )
}

pub fn rejection(err: &QuizError) -> String {
    match err {
        QuizError::Storage(_) => STORAGE_APOLOGY.to_owned(),
        err => format!("❗️ {}", escape(&err.to_string())),
    }
}
