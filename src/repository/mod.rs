// src/repository/mod.rs

pub mod memory;
pub mod postgres;

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
};

/// Abstract persistence gateway for the assessment domain.
///
/// Every multi-row write (nested tryout creation, cascade delete, answer
/// batch replacement) is a single atomic operation: partial application
/// on failure would leave orphaned rows or an inconsistent score, so the
/// implementations wrap these in one transaction (Postgres) or one lock
/// scope (in-memory).
#[async_trait]
pub trait Repository: Send + Sync {
    // ---- users ----

    async fn create_user(&self, user: &User) -> Result<(), AppError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    // ---- token blacklist ----

    async fn blacklist_token(
        &self,
        token: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError>;
    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, AppError>;

    // ---- tryouts ----

    /// Inserts the tryout together with its nested questions and choices.
    /// All-or-nothing: no rows remain if any insert fails.
    async fn create_tryout(&self, detail: &TryoutDetail) -> Result<(), AppError>;
    async fn get_tryout(&self, id: Uuid) -> Result<Option<TryoutDetail>, AppError>;
    async fn list_tryouts(&self) -> Result<Vec<Tryout>, AppError>;
    /// Case-insensitive title substring search.
    async fn find_tryouts_by_title(&self, needle: &str) -> Result<Vec<Tryout>, AppError>;
    async fn find_tryouts_by_category(&self, category: Category) -> Result<Vec<Tryout>, AppError>;
    /// Updates the tryout row (metadata only, questions untouched).
    async fn update_tryout(&self, tryout: &Tryout) -> Result<(), AppError>;
    /// Cascade delete: choices, then questions, then the tryout,
    /// in one transaction.
    async fn delete_tryout(&self, id: Uuid) -> Result<(), AppError>;
    async fn count_submissions(&self, tryout_id: Uuid) -> Result<i64, AppError>;

    // ---- questions ----

    /// Inserts a question and its choices in one transaction.
    async fn create_question(&self, detail: &QuestionDetail) -> Result<(), AppError>;
    async fn get_question(&self, id: Uuid) -> Result<Option<QuestionDetail>, AppError>;
    async fn list_questions(&self, tryout_id: Uuid) -> Result<Vec<QuestionDetail>, AppError>;
    /// Updates the question row and, when `choices` is supplied, replaces
    /// the choice set: rows absent from the list are deleted, rows with a
    /// matching id updated, the rest inserted. One transaction.
    async fn update_question(
        &self,
        question: &Question,
        choices: Option<&[Choice]>,
    ) -> Result<(), AppError>;
    /// Deletes the question and its choices in one transaction.
    async fn delete_question(&self, id: Uuid) -> Result<(), AppError>;

    // ---- submissions ----

    /// Atomic insert-if-absent keyed on (tryout_id, user_id): returns the
    /// existing submission untouched when one is already present. A plain
    /// check-then-insert would race under concurrent calls.
    async fn create_submission_if_absent(
        &self,
        submission: &Submission,
    ) -> Result<Submission, AppError>;
    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, AppError>;
    async fn find_submission(
        &self,
        tryout_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Submission>, AppError>;
    async fn list_submissions_by_user(&self, user_id: Uuid) -> Result<Vec<Submission>, AppError>;
    async fn list_submissions_by_tryout(
        &self,
        tryout_id: Uuid,
    ) -> Result<Vec<Submission>, AppError>;
    async fn list_answers(&self, submission_id: Uuid) -> Result<Vec<Answer>, AppError>;

    /// Replaces the submission's answers for the questions covered by
    /// `answers`, recomputes the score as the sum over all answer rows
    /// then present, and stamps `submitted_at`, all in one transaction.
    /// The score never depends on a read taken outside the transaction,
    /// so concurrent batches for the same submission cannot store a
    /// total that misses each other's rows. Fails with `Locked` if the
    /// submission was finalized by the time the transaction runs.
    async fn replace_answers(
        &self,
        submission_id: Uuid,
        answers: &[Answer],
        submitted_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError>;

    /// Marks the submission finalized and re-stamps `submitted_at`.
    async fn finalize_submission(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError>;
}
