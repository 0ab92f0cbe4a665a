use teloxide::types::UserId;
use thiserror::Error;

use crate::database::model::TestCode;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a submission already exists for this test and student")]
    DuplicateSubmission,
    #[error("storage fault: {0}")]
    Fault(#[source] BoxError),
}

impl StoreError {
    pub fn fault(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Fault(Box::new(err))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::DuplicateSubmission,
            err => Self::fault(err),
        }
    }
}

/// Rejections produced by the test lifecycle. Everything except `Storage`
/// is a business rule and is shown to the user verbatim.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("Test {0} was not found. Please check the test code and try again.")]
    TestNotFound(TestCode),
    #[error("You are not registered yet. Send /start to register.")]
    UserNotFound(UserId),
    #[error("You have already submitted answers for test {0}. Only one submission per test is allowed.")]
    DuplicateSubmission(TestCode),
    #[error("Test {0} is already finished.")]
    TestAlreadyFinished(TestCode),
    #[error("Length mismatch: expected {expected} answers, got {actual}.")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Only the author of test {0} can do that.")]
    NotAuthor(TestCode),
    #[error(transparent)]
    Storage(StoreError),
}

impl QuizError {
    pub(crate) fn from_store(err: StoreError, code: TestCode) -> Self {
        match err {
            StoreError::DuplicateSubmission => Self::DuplicateSubmission(code),
            err => Self::Storage(err),
        }
    }
}

impl From<StoreError> for QuizError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err)
    }
}
