// src/repository/memory.rs

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        question::{Choice, Question, QuestionDetail},
        submission::{Answer, Submission},
        tryout::{Category, Tryout, TryoutDetail},
        user::User,
    },
    repository::Repository,
    services::grading,
};

/// In-memory [`Repository`] for tests and local runs without a database.
///
/// A single mutex guards all tables, so every operation is atomic by
/// construction; in particular `create_submission_if_absent` is a real
/// insert-if-absent, matching the Postgres unique-constraint behavior.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    blacklisted_tokens: HashMap<String, chrono::DateTime<chrono::Utc>>,
    tryouts: HashMap<Uuid, Tryout>,
    questions: HashMap<Uuid, Question>,
    choices: HashMap<Uuid, Choice>,
    submissions: HashMap<Uuid, Submission>,
    answers: HashMap<Uuid, Answer>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn question_detail(&self, question: &Question) -> QuestionDetail {
        let mut choices: Vec<Choice> = self
            .choices
            .values()
            .filter(|c| c.question_id == question.id)
            .cloned()
            .collect();
        choices.sort_by_key(|c| c.id);
        QuestionDetail {
            question: question.clone(),
            choices,
        }
    }

    fn tryout_questions(&self, tryout_id: Uuid) -> Vec<QuestionDetail> {
        let mut questions: Vec<&Question> = self
            .questions
            .values()
            .filter(|q| q.tryout_id == tryout_id)
            .collect();
        questions.sort_by_key(|q| q.id);
        questions
            .into_iter()
            .map(|q| self.question_detail(q))
            .collect()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    // ---- users ----

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("User already exists".into()));
        }
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("User already exists".into()));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    // ---- token blacklist ----

    async fn blacklist_token(
        &self,
        token: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        // Entries past their expiry can never block a token again;
        // drop them so the table tracks only live bans.
        let now = chrono::Utc::now();
        inner.blacklisted_tokens.retain(|_, exp| *exp > now);
        inner.blacklisted_tokens.insert(token.to_owned(), expires_at);
        Ok(())
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .blacklisted_tokens
            .get(token)
            .is_some_and(|exp| *exp > chrono::Utc::now()))
    }

    // ---- tryouts ----

    async fn create_tryout(&self, detail: &TryoutDetail) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .tryouts
            .insert(detail.tryout.id, detail.tryout.clone());
        for q in &detail.questions {
            inner.questions.insert(q.question.id, q.question.clone());
            for c in &q.choices {
                inner.choices.insert(c.id, c.clone());
            }
        }
        Ok(())
    }

    async fn get_tryout(&self, id: Uuid) -> Result<Option<TryoutDetail>, AppError> {
        let inner = self.inner.lock().unwrap();
        let Some(tryout) = inner.tryouts.get(&id) else {
            return Ok(None);
        };
        Ok(Some(TryoutDetail {
            tryout: tryout.clone(),
            questions: inner.tryout_questions(id),
        }))
    }

    async fn list_tryouts(&self) -> Result<Vec<Tryout>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut tryouts: Vec<Tryout> = inner.tryouts.values().cloned().collect();
        tryouts.sort_by_key(|t| t.start_at);
        Ok(tryouts)
    }

    async fn find_tryouts_by_title(&self, needle: &str) -> Result<Vec<Tryout>, AppError> {
        let needle = needle.to_lowercase();
        let inner = self.inner.lock().unwrap();
        let mut tryouts: Vec<Tryout> = inner
            .tryouts
            .values()
            .filter(|t| t.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        tryouts.sort_by_key(|t| t.start_at);
        Ok(tryouts)
    }

    async fn find_tryouts_by_category(&self, category: Category) -> Result<Vec<Tryout>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut tryouts: Vec<Tryout> = inner
            .tryouts
            .values()
            .filter(|t| t.category == category)
            .cloned()
            .collect();
        tryouts.sort_by_key(|t| t.start_at);
        Ok(tryouts)
    }

    async fn update_tryout(&self, tryout: &Tryout) -> Result<(), AppError> {
        self.inner
            .lock()
            .unwrap()
            .tryouts
            .insert(tryout.id, tryout.clone());
        Ok(())
    }

    async fn delete_tryout(&self, id: Uuid) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        let question_ids: Vec<Uuid> = inner
            .questions
            .values()
            .filter(|q| q.tryout_id == id)
            .map(|q| q.id)
            .collect();
        inner
            .choices
            .retain(|_, c| !question_ids.contains(&c.question_id));
        inner.questions.retain(|_, q| q.tryout_id != id);
        inner.tryouts.remove(&id);
        Ok(())
    }

    async fn count_submissions(&self, tryout_id: Uuid) -> Result<i64, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .submissions
            .values()
            .filter(|s| s.tryout_id == tryout_id)
            .count() as i64)
    }

    // ---- questions ----

    async fn create_question(&self, detail: &QuestionDetail) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .questions
            .insert(detail.question.id, detail.question.clone());
        for c in &detail.choices {
            inner.choices.insert(c.id, c.clone());
        }
        Ok(())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<QuestionDetail>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .questions
            .get(&id)
            .map(|q| inner.question_detail(q)))
    }

    async fn list_questions(&self, tryout_id: Uuid) -> Result<Vec<QuestionDetail>, AppError> {
        Ok(self.inner.lock().unwrap().tryout_questions(tryout_id))
    }

    async fn update_question(
        &self,
        question: &Question,
        choices: Option<&[Choice]>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.questions.insert(question.id, question.clone());
        if let Some(choices) = choices {
            let keep: Vec<Uuid> = choices.iter().map(|c| c.id).collect();
            inner
                .choices
                .retain(|_, c| c.question_id != question.id || keep.contains(&c.id));
            for c in choices {
                inner.choices.insert(c.id, c.clone());
            }
        }
        Ok(())
    }

    async fn delete_question(&self, id: Uuid) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.choices.retain(|_, c| c.question_id != id);
        inner.questions.remove(&id);
        Ok(())
    }

    // ---- submissions ----

    async fn create_submission_if_absent(
        &self,
        submission: &Submission,
    ) -> Result<Submission, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .submissions
            .values()
            .find(|s| s.tryout_id == submission.tryout_id && s.user_id == submission.user_id)
        {
            return Ok(existing.clone());
        }
        inner.submissions.insert(submission.id, submission.clone());
        Ok(submission.clone())
    }

    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, AppError> {
        Ok(self.inner.lock().unwrap().submissions.get(&id).cloned())
    }

    async fn find_submission(
        &self,
        tryout_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Submission>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .submissions
            .values()
            .find(|s| s.tryout_id == tryout_id && s.user_id == user_id)
            .cloned())
    }

    async fn list_submissions_by_user(&self, user_id: Uuid) -> Result<Vec<Submission>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut subs: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.id);
        Ok(subs)
    }

    async fn list_submissions_by_tryout(
        &self,
        tryout_id: Uuid,
    ) -> Result<Vec<Submission>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut subs: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|s| s.tryout_id == tryout_id)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.id);
        Ok(subs)
    }

    async fn list_answers(&self, submission_id: Uuid) -> Result<Vec<Answer>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut answers: Vec<Answer> = inner
            .answers
            .values()
            .filter(|a| a.submission_id == submission_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.id);
        Ok(answers)
    }

    async fn replace_answers(
        &self,
        submission_id: Uuid,
        answers: &[Answer],
        submitted_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();

        let sub = inner.submissions.get(&submission_id).ok_or_else(|| {
            AppError::NotFound(format!("Submission with ID {submission_id} not found"))
        })?;
        if sub.finalized_at.is_some() {
            return Err(AppError::Locked(
                "Submission has already been finalized".to_string(),
            ));
        }
        let tryout_id = sub.tryout_id;

        let replaced: Vec<Uuid> = answers.iter().map(|a| a.question_id).collect();
        inner.answers.retain(|_, a| {
            a.submission_id != submission_id || !replaced.contains(&a.question_id)
        });
        for a in answers {
            inner.answers.insert(a.id, a.clone());
        }

        // Re-aggregate over the rows now present, still under the lock
        // that wrote them.
        let questions = inner.tryout_questions(tryout_id);
        let final_answers: Vec<Answer> = inner
            .answers
            .values()
            .filter(|a| a.submission_id == submission_id)
            .cloned()
            .collect();
        let score = grading::aggregate_score(&questions, &final_answers);

        if let Some(sub) = inner.submissions.get_mut(&submission_id) {
            sub.score = score;
            sub.submitted_at = Some(submitted_at);
        }
        Ok(())
    }

    async fn finalize_submission(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sub) = inner.submissions.get_mut(&id) {
            sub.finalized_at = Some(at);
            sub.submitted_at = Some(at);
        }
        Ok(())
    }
}
