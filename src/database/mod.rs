use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::types::UserId;

use crate::error::StoreError;
use model::{NewSubmission, Standing, Test, TestCode, User};

pub mod connection;
pub mod memory;
pub mod model;

/// Durable keyed storage for users, tests and submissions.
///
/// Every method is atomic on its own; callers never need a transaction that
/// spans two calls. Absence is reported as `None`/empty, never as an error.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Inserts the user, or renames it when it already exists. `joined_at`
    /// is only written on insert.
    async fn upsert_user(
        &self,
        id: UserId,
        name: &str,
        joined_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn create_test(
        &self,
        subject: &str,
        answer_key: &str,
        author_id: UserId,
    ) -> Result<TestCode, StoreError>;

    async fn get_test(&self, code: TestCode) -> Result<Option<Test>, StoreError>;

    /// Marks the test finished. Returns `true` only for the call that
    /// performed the transition; finishing twice is not an error here.
    async fn finish_test(&self, code: TestCode) -> Result<bool, StoreError>;

    async fn has_submission(&self, code: TestCode, student_id: UserId)
        -> Result<bool, StoreError>;

    /// Fails with [`StoreError::DuplicateSubmission`] if the pair already has
    /// a submission. The check and the insert are one step.
    async fn record_submission(&self, submission: &NewSubmission) -> Result<(), StoreError>;

    /// Standings ordered by correct answers, ties in submission order.
    async fn leaderboard(&self, code: TestCode) -> Result<Vec<Standing>, StoreError>;

    async fn participant_ids(&self, code: TestCode) -> Result<Vec<UserId>, StoreError>;
}
