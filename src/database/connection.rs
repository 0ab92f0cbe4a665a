use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, FromRow};
use teloxide::types::UserId;

use super::model::{NewSubmission, Standing, Test, TestCode, User};
use super::Store;
use crate::error::StoreError;

/// Postgres-backed [`Store`] over a connection pool.
pub struct Connection {
    pool: PgPool,
}

impl Connection {
    pub async fn connect(connection_string: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(connection_string).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        tracing::debug!("Applying migrations");
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(StoreError::fault)
    }
}

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    name: String,
    joined_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct TestRecord {
    code: i64,
    subject: String,
    answer_key: String,
    author_id: i64,
    question_count: i32,
    finished: bool,
}

#[derive(FromRow)]
struct StandingRecord {
    name: String,
    correct_count: i32,
}

fn user_key(id: UserId) -> Result<i64, StoreError> {
    i64::try_from(id.0).map_err(StoreError::fault)
}

fn user_id(key: i64) -> Result<UserId, StoreError> {
    u64::try_from(key).map(UserId).map_err(StoreError::fault)
}

fn count_column(count: usize) -> Result<i32, StoreError> {
    i32::try_from(count).map_err(StoreError::fault)
}

fn count_value(column: i32) -> Result<usize, StoreError> {
    usize::try_from(column).map_err(StoreError::fault)
}

impl TryFrom<UserRecord> for User {
    type Error = StoreError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        Ok(User {
            id: user_id(record.id)?,
            name: record.name,
            joined_at: record.joined_at,
        })
    }
}

impl TryFrom<TestRecord> for Test {
    type Error = StoreError;

    fn try_from(record: TestRecord) -> Result<Self, Self::Error> {
        Ok(Test {
            code: TestCode(record.code),
            subject: record.subject,
            answer_key: record.answer_key,
            author_id: user_id(record.author_id)?,
            question_count: count_value(record.question_count)?,
            finished: record.finished,
        })
    }
}

#[async_trait]
impl Store for Connection {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let record: Option<UserRecord> =
            sqlx::query_as("SELECT id, name, joined_at FROM users WHERE id = $1")
                .bind(user_key(id)?)
                .fetch_optional(&self.pool)
                .await?;

        record.map(User::try_from).transpose()
    }

    async fn upsert_user(
        &self,
        id: UserId,
        name: &str,
        joined_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, name, joined_at) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(user_key(id)?)
        .bind(name)
        .bind(joined_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_test(
        &self,
        subject: &str,
        answer_key: &str,
        author_id: UserId,
    ) -> Result<TestCode, StoreError> {
        let (code,): (i64,) = sqlx::query_as(
            "INSERT INTO tests (subject, answer_key, author_id, question_count) \
             VALUES ($1, $2, $3, $4) RETURNING code",
        )
        .bind(subject)
        .bind(answer_key)
        .bind(user_key(author_id)?)
        .bind(count_column(answer_key.chars().count())?)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(code, subject, "Test inserted");
        Ok(TestCode(code))
    }

    async fn get_test(&self, code: TestCode) -> Result<Option<Test>, StoreError> {
        let record: Option<TestRecord> = sqlx::query_as(
            "SELECT code, subject, answer_key, author_id, question_count, finished \
             FROM tests WHERE code = $1",
        )
        .bind(code.0)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Test::try_from).transpose()
    }

    async fn finish_test(&self, code: TestCode) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE tests SET finished = TRUE WHERE code = $1 AND finished = FALSE")
                .bind(code.0)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn has_submission(
        &self,
        code: TestCode,
        student_id: UserId,
    ) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM submissions WHERE test_code = $1 AND student_id = $2)",
        )
        .bind(code.0)
        .bind(user_key(student_id)?)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn record_submission(&self, submission: &NewSubmission) -> Result<(), StoreError> {
        // UNIQUE (test_code, student_id) turns a racing duplicate into a unique
        // violation, which `StoreError::from` maps to `DuplicateSubmission`.
        sqlx::query(
            "INSERT INTO submissions (test_code, student_id, answers, correct_count) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(submission.test_code.0)
        .bind(user_key(submission.student_id)?)
        .bind(&submission.answers)
        .bind(count_column(submission.correct_count)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn leaderboard(&self, code: TestCode) -> Result<Vec<Standing>, StoreError> {
        let records: Vec<StandingRecord> = sqlx::query_as(
            "SELECT users.name, submissions.correct_count FROM submissions \
             INNER JOIN users ON submissions.student_id = users.id \
             WHERE submissions.test_code = $1 \
             ORDER BY submissions.correct_count DESC, submissions.id ASC",
        )
        .bind(code.0)
        .fetch_all(&self.pool)
        .await?;

        records
            .into_iter()
            .map(|record| -> Result<Standing, StoreError> {
                Ok(Standing {
                    name: record.name,
                    correct_count: count_value(record.correct_count)?,
                })
            })
            .collect()
    }

    async fn participant_ids(&self, code: TestCode) -> Result<Vec<UserId>, StoreError> {
        let records: Vec<(i64,)> =
            sqlx::query_as("SELECT student_id FROM submissions WHERE test_code = $1 ORDER BY id")
                .bind(code.0)
                .fetch_all(&self.pool)
                .await?;

        records.into_iter().map(|(id,)| user_id(id)).collect()
    }
}
