use std::{fmt, num::ParseIntError, str::FromStr};

use chrono::{DateTime, Utc};
use teloxide::types::UserId;

/// Store-assigned identifier of a test, shown to users as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestCode(pub i64);

impl fmt::Display for TestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TestCode {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(TestCode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Test {
    pub code: TestCode,
    pub subject: String,
    pub answer_key: String,
    pub author_id: UserId,
    pub question_count: usize,
    pub finished: bool,
}

impl Test {
    pub fn reference(&self) -> TestRef {
        TestRef {
            subject: self.subject.clone(),
            code: self.code,
            question_count: self.question_count,
        }
    }
}

/// The (subject, code, question count) triple that follow-up actions carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRef {
    pub subject: String,
    pub code: TestCode,
    pub question_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub test_code: TestCode,
    pub student_id: UserId,
    pub answers: String,
    pub correct_count: usize,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub name: String,
    pub correct_count: usize,
}
