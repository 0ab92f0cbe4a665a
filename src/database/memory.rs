use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::types::UserId;
use tokio::sync::Mutex;

use super::model::{NewSubmission, Standing, Test, TestCode, User};
use super::Store;
use crate::error::StoreError;

/// In-process [`Store`]. Each call runs inside a single critical section, so
/// it gives the same atomicity as the Postgres backend. Nothing survives a
/// restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    tests: BTreeMap<TestCode, Test>,
    // Insertion order doubles as the leaderboard tie-break.
    submissions: Vec<NewSubmission>,
    last_code: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn upsert_user(
        &self,
        id: UserId,
        name: &str,
        joined_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .users
            .entry(id)
            .and_modify(|user| user.name = name.to_owned())
            .or_insert_with(|| User {
                id,
                name: name.to_owned(),
                joined_at,
            });
        Ok(())
    }

    async fn create_test(
        &self,
        subject: &str,
        answer_key: &str,
        author_id: UserId,
    ) -> Result<TestCode, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.last_code += 1;
        let code = TestCode(inner.last_code);
        inner.tests.insert(
            code,
            Test {
                code,
                subject: subject.to_owned(),
                answer_key: answer_key.to_owned(),
                author_id,
                question_count: answer_key.chars().count(),
                finished: false,
            },
        );
        Ok(code)
    }

    async fn get_test(&self, code: TestCode) -> Result<Option<Test>, StoreError> {
        Ok(self.inner.lock().await.tests.get(&code).cloned())
    }

    async fn finish_test(&self, code: TestCode) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.tests.get_mut(&code) {
            Some(test) if !test.finished => {
                test.finished = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn has_submission(
        &self,
        code: TestCode,
        student_id: UserId,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .submissions
            .iter()
            .any(|s| s.test_code == code && s.student_id == student_id))
    }

    async fn record_submission(&self, submission: &NewSubmission) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let duplicate = inner.submissions.iter().any(|s| {
            s.test_code == submission.test_code && s.student_id == submission.student_id
        });
        if duplicate {
            return Err(StoreError::DuplicateSubmission);
        }
        inner.submissions.push(submission.clone());
        Ok(())
    }

    async fn leaderboard(&self, code: TestCode) -> Result<Vec<Standing>, StoreError> {
        let inner = self.inner.lock().await;
        let mut standings: Vec<Standing> = inner
            .submissions
            .iter()
            .filter(|s| s.test_code == code)
            .map(|s| Standing {
                name: inner
                    .users
                    .get(&s.student_id)
                    .map(|user| user.name.clone())
                    .unwrap_or_default(),
                correct_count: s.correct_count,
            })
            .collect();
        // `sort_by` is stable: equal scores keep submission order.
        standings.sort_by(|a, b| b.correct_count.cmp(&a.correct_count));
        Ok(standings)
    }

    async fn participant_ids(&self, code: TestCode) -> Result<Vec<UserId>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .submissions
            .iter()
            .filter(|s| s.test_code == code)
            .map(|s| s.student_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(code: TestCode, student: u64, correct_count: usize) -> NewSubmission {
        NewSubmission {
            test_code: code,
            student_id: UserId(student),
            answers: "a".repeat(5),
            correct_count,
        }
    }

    #[tokio::test]
    async fn upsert_keeps_the_original_join_date() {
        let store = MemoryStore::new();
        let first = Utc::now();
        store.upsert_user(UserId(1), "Alice", first).await.unwrap();
        store
            .upsert_user(UserId(1), "Alice Smith", first + chrono::Duration::days(1))
            .await
            .unwrap();

        let user = store.get_user(UserId(1)).await.unwrap().unwrap();
        assert_eq!(user.name, "Alice Smith");
        assert_eq!(user.joined_at, first);
    }

    #[tokio::test]
    async fn codes_are_fresh_and_count_follows_the_key() {
        let store = MemoryStore::new();
        let first = store.create_test("Chemistry", "abcd", UserId(1)).await.unwrap();
        let second = store.create_test("Physics", "ab", UserId(1)).await.unwrap();
        assert_ne!(first, second);

        let test = store.get_test(second).await.unwrap().unwrap();
        assert_eq!(test.question_count, 2);
        assert!(!test.finished);
        assert!(store.get_test(TestCode(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finish_reports_only_the_first_transition() {
        let store = MemoryStore::new();
        let code = store.create_test("Chemistry", "abcd", UserId(1)).await.unwrap();

        assert!(store.finish_test(code).await.unwrap());
        assert!(!store.finish_test(code).await.unwrap());
        assert!(store.get_test(code).await.unwrap().unwrap().finished);
    }

    #[tokio::test]
    async fn second_submission_for_a_pair_is_rejected() {
        let store = MemoryStore::new();
        let code = store.create_test("Chemistry", "abcde", UserId(1)).await.unwrap();

        store.record_submission(&submission(code, 2, 3)).await.unwrap();
        let err = store.record_submission(&submission(code, 2, 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSubmission));
        assert!(store.has_submission(code, UserId(2)).await.unwrap());
        assert!(!store.has_submission(code, UserId(3)).await.unwrap());
    }

    #[tokio::test]
    async fn leaderboard_is_descending_with_stable_ties() {
        let store = MemoryStore::new();
        let code = store.create_test("Chemistry", "abcde", UserId(1)).await.unwrap();
        for (id, name) in [(10, "Ann"), (11, "Ben"), (12, "Cid"), (13, "Dee")] {
            store.upsert_user(UserId(id), name, Utc::now()).await.unwrap();
        }
        for (id, score) in [(10, 3), (11, 5), (12, 5), (13, 1)] {
            store.record_submission(&submission(code, id, score)).await.unwrap();
        }

        let board = store.leaderboard(code).await.unwrap();
        let rows: Vec<(&str, usize)> = board
            .iter()
            .map(|s| (s.name.as_str(), s.correct_count))
            .collect();
        assert_eq!(rows, vec![("Ben", 5), ("Cid", 5), ("Ann", 3), ("Dee", 1)]);
        assert_eq!(
            store.participant_ids(code).await.unwrap(),
            vec![UserId(10), UserId(11), UserId(12), UserId(13)]
        );
    }
}
