use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use teloxide::types::UserId;
use tracing::{error, info, instrument, warn};

use crate::{
    commands::{title_case, TestAction},
    database::{
        model::{NewSubmission, Standing, Test, TestCode, TestRef},
        Store,
    },
    error::QuizError,
    grader, messages,
    notifier::{self, BroadcastReport, Notifier},
};

/// Confirmation shown to the student after a graded submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub student_name: String,
    pub test: TestRef,
    pub correct_count: usize,
    pub ratio: f64,
    pub submitted_at: DateTime<Utc>,
}

/// Message for the author of a test that just received a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorNotice {
    pub author_id: UserId,
    pub student_name: String,
    pub test: TestRef,
    pub actions: Vec<TestAction>,
}

#[derive(Debug)]
pub struct Submitted {
    pub receipt: Receipt,
    pub notice: AuthorNotice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standings {
    pub test: TestRef,
    pub entries: Vec<Standing>,
}

#[derive(Debug)]
pub struct FinalResults {
    pub test: TestRef,
    pub message: String,
    pub broadcast: BroadcastReport,
}

fn is_answer(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn normalize_answers(raw: &str, what: &str) -> Result<String, QuizError> {
    let answers = raw.trim();
    if answers.is_empty() {
        return Err(QuizError::InvalidFormat(format!("{what} must not be empty.")));
    }
    if !answers.chars().all(is_answer) {
        return Err(QuizError::InvalidFormat(format!(
            "{what} may only contain letters."
        )));
    }
    Ok(answers.to_ascii_lowercase())
}

/// Creates tests, grades submissions and closes tests.
pub struct TestManager {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    retry_cap: Duration,
}

impl TestManager {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, retry_cap: Duration) -> Self {
        Self {
            store,
            notifier,
            retry_cap,
        }
    }

    async fn test(&self, code: TestCode) -> Result<Test, QuizError> {
        self.store
            .get_test(code)
            .await
            .map_err(|err| {
                error!(code = %code, %err, "Loading test failed");
                QuizError::from(err)
            })?
            .ok_or(QuizError::TestNotFound(code))
    }

    async fn authored_test(&self, requester: UserId, code: TestCode) -> Result<Test, QuizError> {
        let test = self.test(code).await?;
        if test.author_id != requester {
            warn!(requester = requester.0, code = %code, "Action on someone else's test");
            return Err(QuizError::NotAuthor(code));
        }
        Ok(test)
    }

    #[instrument(level = "info", skip(self))]
    pub async fn create_test(
        &self,
        subject: &str,
        answer_key_raw: &str,
        author: UserId,
    ) -> Result<TestRef, QuizError> {
        let subject = title_case(subject);
        if subject.is_empty() {
            return Err(QuizError::InvalidFormat("subject must not be empty.".into()));
        }
        if !subject.chars().all(|c| is_answer(c) || c == ' ') {
            return Err(QuizError::InvalidFormat(
                "the subject may only contain letters and spaces.".into(),
            ));
        }
        let answer_key = normalize_answers(answer_key_raw, "the answer key")?;

        let code = self
            .store
            .create_test(&subject, &answer_key, author)
            .await
            .inspect_err(|err| error!(author = author.0, %err, "Creating test failed"))?;

        info!(code = %code, subject = %subject, "Test created");
        Ok(TestRef {
            subject,
            code,
            question_count: answer_key.len(),
        })
    }

    /// Grades and records a submission, then tells the author about it. The
    /// author notice is best-effort and never fails the submission.
    #[instrument(level = "info", skip(self))]
    pub async fn submit_answers(
        &self,
        code: TestCode,
        student: UserId,
        answers_raw: &str,
    ) -> Result<Submitted, QuizError> {
        let test = self.test(code).await?;
        if test.finished {
            return Err(QuizError::TestAlreadyFinished(code));
        }
        if self
            .store
            .has_submission(code, student)
            .await
            .map_err(|err| QuizError::from_store(err, code))?
        {
            return Err(QuizError::DuplicateSubmission(code));
        }
        let actual = answers_raw.trim().chars().count();
        if actual != test.question_count {
            return Err(QuizError::LengthMismatch {
                expected: test.question_count,
                actual,
            });
        }
        let answers = normalize_answers(answers_raw, "answers")?;
        let student_name = self
            .store
            .get_user(student)
            .await?
            .ok_or(QuizError::UserNotFound(student))?
            .name;

        let correct_count = grader::grade(&answers, &test.answer_key);
        self.store
            .record_submission(&NewSubmission {
                test_code: code,
                student_id: student,
                answers,
                correct_count,
            })
            .await
            .map_err(|err| {
                let err = QuizError::from_store(err, code);
                if let QuizError::Storage(fault) = &err {
                    error!(code = %code, student = student.0, %fault, "Recording submission failed");
                }
                err
            })?;
        info!(code = %code, student = student.0, correct_count, "Submission recorded");

        let test_ref = test.reference();
        let receipt = Receipt {
            student_name: student_name.clone(),
            test: test_ref.clone(),
            correct_count,
            ratio: grader::ratio(correct_count, test.question_count),
            submitted_at: Utc::now(),
        };
        let notice = AuthorNotice {
            author_id: test.author_id,
            student_name,
            actions: vec![
                TestAction::Status(test_ref.clone()),
                TestAction::Finish {
                    test: test_ref.clone(),
                    answer_key: Some(test.answer_key.clone()),
                },
            ],
            test: test_ref,
        };

        if let Err(err) = notifier::deliver(
            self.notifier.as_ref(),
            notice.author_id,
            &messages::author_notice(&notice),
            &notice.actions,
            self.retry_cap,
        )
        .await
        {
            warn!(author = notice.author_id.0, %err, "Author notice not delivered");
        }

        Ok(Submitted { receipt, notice })
    }

    /// Current leaderboard; read-only and repeatable.
    #[instrument(level = "info", skip(self))]
    pub async fn view_status(
        &self,
        requester: UserId,
        code: TestCode,
    ) -> Result<Standings, QuizError> {
        let test = self.authored_test(requester, code).await?;
        let entries = self.store.leaderboard(code).await?;
        Ok(Standings {
            test: test.reference(),
            entries,
        })
    }

    /// Closes the test once and broadcasts the final standings with the
    /// answer key to every participant. The stored key is the one echoed.
    #[instrument(level = "info", skip(self))]
    pub async fn finish_test(
        &self,
        requester: UserId,
        code: TestCode,
        answer_key: Option<&str>,
    ) -> Result<FinalResults, QuizError> {
        let test = self.authored_test(requester, code).await?;
        if test.finished {
            return Err(QuizError::TestAlreadyFinished(code));
        }
        if let Some(key) = answer_key.filter(|key| !key.eq_ignore_ascii_case(&test.answer_key)) {
            warn!(code = %code, key, "Finish payload carries a stale answer key");
        }
        // Only the caller that flips the flag broadcasts.
        if !self.store.finish_test(code).await? {
            return Err(QuizError::TestAlreadyFinished(code));
        }

        let test_ref = test.reference();
        let board = self.store.leaderboard(code).await?;
        let message = messages::final_results(&test_ref, &board, &test.answer_key);
        let participants = self.store.participant_ids(code).await?;

        let broadcast =
            notifier::broadcast(self.notifier.as_ref(), &participants, &message, self.retry_cap)
                .await;
        info!(
            code = %code,
            delivered = broadcast.delivered.len(),
            failed = broadcast.failed.len(),
            "Test finished"
        );

        Ok(FinalResults {
            test: test_ref,
            message,
            broadcast,
        })
    }
}
