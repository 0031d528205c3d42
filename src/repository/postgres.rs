// src/repository/postgres.rs

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        question::{Choice, Question, QuestionDetail, QuestionType},
        submission::{Answer, Submission},
        tryout::{Category, Tryout, TryoutDetail},
        user::User,
    },
    repository::Repository,
};

/// Production [`Repository`] backed by Postgres via sqlx.
///
/// Uses the runtime query API with explicit transactions for every
/// multi-row write. Closed-set enums are stored as TEXT and parsed back
/// on read; an unparseable value means a corrupted row and surfaces as
/// an internal error.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    password: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            email: r.email,
            username: r.username,
            password: r.password,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct TryoutRow {
    id: Uuid,
    title: String,
    description: String,
    category: String,
    duration: i64,
    start_at: chrono::DateTime<chrono::Utc>,
    end_at: chrono::DateTime<chrono::Utc>,
    user_id: Uuid,
}

impl TryoutRow {
    fn into_tryout(self) -> Result<Tryout, AppError> {
        let category = self
            .category
            .parse::<Category>()
            .map_err(|_| AppError::InternalServerError(format!(
                "Corrupt category value '{}' for tryout {}",
                self.category, self.id
            )))?;
        Ok(Tryout {
            id: self.id,
            title: self.title,
            description: self.description,
            category,
            duration: self.duration,
            start_at: self.start_at,
            end_at: self.end_at,
            user_id: self.user_id,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    tryout_id: Uuid,
    text: String,
    score: i32,
    question_type: String,
    correct_short_answer: Option<String>,
}

impl QuestionRow {
    fn into_question(self) -> Result<Question, AppError> {
        let question_type = self
            .question_type
            .parse::<QuestionType>()
            .map_err(|_| AppError::InternalServerError(format!(
                "Corrupt question type '{}' for question {}",
                self.question_type, self.id
            )))?;
        Ok(Question {
            id: self.id,
            tryout_id: self.tryout_id,
            text: self.text,
            score: self.score,
            question_type,
            correct_short_answer: self.correct_short_answer,
        })
    }
}

#[derive(FromRow)]
struct ChoiceRow {
    id: Uuid,
    question_id: Uuid,
    text: String,
    is_answer: bool,
}

impl From<ChoiceRow> for Choice {
    fn from(r: ChoiceRow) -> Self {
        Choice {
            id: r.id,
            question_id: r.question_id,
            text: r.text,
            is_answer: r.is_answer,
        }
    }
}

#[derive(FromRow)]
struct SubmissionRow {
    id: Uuid,
    tryout_id: Uuid,
    user_id: Uuid,
    score: i32,
    submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    finalized_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<SubmissionRow> for Submission {
    fn from(r: SubmissionRow) -> Self {
        Submission {
            id: r.id,
            tryout_id: r.tryout_id,
            user_id: r.user_id,
            score: r.score,
            submitted_at: r.submitted_at,
            finalized_at: r.finalized_at,
        }
    }
}

#[derive(FromRow)]
struct AnswerRow {
    id: Uuid,
    submission_id: Uuid,
    question_id: Uuid,
    choice_id: Option<Uuid>,
    short_answer: Option<String>,
    is_correct: bool,
}

impl From<AnswerRow> for Answer {
    fn from(r: AnswerRow) -> Self {
        Answer {
            id: r.id,
            submission_id: r.submission_id,
            question_id: r.question_id,
            choice_id: r.choice_id,
            short_answer: r.short_answer,
            is_correct: r.is_correct,
        }
    }
}

/// Maps Postgres unique violations (code 23505) to 409 Conflict.
fn map_insert_err(e: sqlx::Error, what: &str) -> AppError {
    if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
        AppError::Conflict(format!("{} already exists", what))
    } else {
        AppError::from(e)
    }
}

const QUESTION_COLUMNS: &str =
    "id, tryout_id, text, score, type AS question_type, correct_short_answer";

#[async_trait]
impl Repository for PgRepository {
    // ---- users ----

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "User"))?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, username, password, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, username, password, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, username, password, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, username, password, created_at FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    // ---- token blacklist ----

    async fn blacklist_token(
        &self,
        token: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError> {
        // Opportunistic purge keeps the table from growing without
        // bound: expired entries can never block a token again.
        sqlx::query("DELETE FROM blacklisted_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO blacklisted_tokens (token, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, AppError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM blacklisted_tokens WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    // ---- tryouts ----

    async fn create_tryout(&self, detail: &TryoutDetail) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let t = &detail.tryout;
        sqlx::query(
            r#"
            INSERT INTO tryouts (id, title, description, category, duration, start_at, end_at, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(t.id)
        .bind(&t.title)
        .bind(&t.description)
        .bind(t.category.as_str())
        .bind(t.duration)
        .bind(t.start_at)
        .bind(t.end_at)
        .bind(t.user_id)
        .execute(&mut *tx)
        .await?;

        for q in &detail.questions {
            insert_question(&mut tx, q).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_tryout(&self, id: Uuid) -> Result<Option<TryoutDetail>, AppError> {
        let row = sqlx::query_as::<_, TryoutRow>(
            r#"
            SELECT id, title, description, category, duration, start_at, end_at, user_id
            FROM tryouts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let tryout = row.into_tryout()?;
        let questions = self.list_questions(id).await?;

        Ok(Some(TryoutDetail { tryout, questions }))
    }

    async fn list_tryouts(&self) -> Result<Vec<Tryout>, AppError> {
        let rows = sqlx::query_as::<_, TryoutRow>(
            r#"
            SELECT id, title, description, category, duration, start_at, end_at, user_id
            FROM tryouts ORDER BY start_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryoutRow::into_tryout).collect()
    }

    async fn find_tryouts_by_title(&self, needle: &str) -> Result<Vec<Tryout>, AppError> {
        let rows = sqlx::query_as::<_, TryoutRow>(
            r#"
            SELECT id, title, description, category, duration, start_at, end_at, user_id
            FROM tryouts WHERE title ILIKE '%' || $1 || '%' ORDER BY start_at
            "#,
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryoutRow::into_tryout).collect()
    }

    async fn find_tryouts_by_category(&self, category: Category) -> Result<Vec<Tryout>, AppError> {
        let rows = sqlx::query_as::<_, TryoutRow>(
            r#"
            SELECT id, title, description, category, duration, start_at, end_at, user_id
            FROM tryouts WHERE category = $1 ORDER BY start_at
            "#,
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryoutRow::into_tryout).collect()
    }

    async fn update_tryout(&self, tryout: &Tryout) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE tryouts
            SET title = $2, description = $3, category = $4, duration = $5,
                start_at = $6, end_at = $7
            WHERE id = $1
            "#,
        )
        .bind(tryout.id)
        .bind(&tryout.title)
        .bind(&tryout.description)
        .bind(tryout.category.as_str())
        .bind(tryout.duration)
        .bind(tryout.start_at)
        .bind(tryout.end_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_tryout(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // Dependency order: choices, then questions, then the tryout.
        sqlx::query(
            "DELETE FROM choices WHERE question_id IN (SELECT id FROM questions WHERE tryout_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM questions WHERE tryout_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM tryouts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count_submissions(&self, tryout_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM submissions WHERE tryout_id = $1")
                .bind(tryout_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // ---- questions ----

    async fn create_question(&self, detail: &QuestionDetail) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        insert_question(&mut tx, detail).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<QuestionDetail>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let question = row.into_question()?;

        let choices = sqlx::query_as::<_, ChoiceRow>(
            "SELECT id, question_id, text, is_answer FROM choices WHERE question_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(QuestionDetail {
            question,
            choices: choices.into_iter().map(Choice::from).collect(),
        }))
    }

    async fn list_questions(&self, tryout_id: Uuid) -> Result<Vec<QuestionDetail>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE tryout_id = $1"
        ))
        .bind(tryout_id)
        .fetch_all(&self.pool)
        .await?;

        let choice_rows = sqlx::query_as::<_, ChoiceRow>(
            r#"
            SELECT c.id, c.question_id, c.text, c.is_answer
            FROM choices c
            JOIN questions q ON c.question_id = q.id
            WHERE q.tryout_id = $1
            "#,
        )
        .bind(tryout_id)
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            let question = row.into_question()?;
            let choices = choice_rows
                .iter()
                .filter(|c| c.question_id == question.id)
                .map(|c| Choice {
                    id: c.id,
                    question_id: c.question_id,
                    text: c.text.clone(),
                    is_answer: c.is_answer,
                })
                .collect();
            details.push(QuestionDetail { question, choices });
        }
        Ok(details)
    }

    async fn update_question(
        &self,
        question: &Question,
        choices: Option<&[Choice]>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE questions
            SET text = $2, score = $3, type = $4, correct_short_answer = $5
            WHERE id = $1
            "#,
        )
        .bind(question.id)
        .bind(&question.text)
        .bind(question.score)
        .bind(question.question_type.as_str())
        .bind(&question.correct_short_answer)
        .execute(&mut *tx)
        .await?;

        if let Some(choices) = choices {
            let keep: Vec<Uuid> = choices.iter().map(|c| c.id).collect();
            sqlx::query("DELETE FROM choices WHERE question_id = $1 AND id != ALL($2)")
                .bind(question.id)
                .bind(&keep)
                .execute(&mut *tx)
                .await?;

            for c in choices {
                sqlx::query(
                    r#"
                    INSERT INTO choices (id, question_id, text, is_answer)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO UPDATE SET text = EXCLUDED.text, is_answer = EXCLUDED.is_answer
                    "#,
                )
                .bind(c.id)
                .bind(c.question_id)
                .bind(&c.text)
                .bind(c.is_answer)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_question(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM choices WHERE question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ---- submissions ----

    async fn create_submission_if_absent(
        &self,
        submission: &Submission,
    ) -> Result<Submission, AppError> {
        // The unique constraint on (tryout_id, user_id) closes the
        // check-then-insert race: exactly one row can ever win.
        let inserted = sqlx::query_as::<_, SubmissionRow>(
            r#"
            INSERT INTO submissions (id, tryout_id, user_id, score, submitted_at, finalized_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tryout_id, user_id) DO NOTHING
            RETURNING id, tryout_id, user_id, score, submitted_at, finalized_at
            "#,
        )
        .bind(submission.id)
        .bind(submission.tryout_id)
        .bind(submission.user_id)
        .bind(submission.score)
        .bind(submission.submitted_at)
        .bind(submission.finalized_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        let existing = self
            .find_submission(submission.tryout_id, submission.user_id)
            .await?;
        existing.ok_or_else(|| {
            AppError::InternalServerError("Submission insert conflicted but no row found".into())
        })
    }

    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, AppError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT id, tryout_id, user_id, score, submitted_at, finalized_at
            FROM submissions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Submission::from))
    }

    async fn find_submission(
        &self,
        tryout_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Submission>, AppError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT id, tryout_id, user_id, score, submitted_at, finalized_at
            FROM submissions WHERE tryout_id = $1 AND user_id = $2
            "#,
        )
        .bind(tryout_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Submission::from))
    }

    async fn list_submissions_by_user(&self, user_id: Uuid) -> Result<Vec<Submission>, AppError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT id, tryout_id, user_id, score, submitted_at, finalized_at
            FROM submissions WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Submission::from).collect())
    }

    async fn list_submissions_by_tryout(
        &self,
        tryout_id: Uuid,
    ) -> Result<Vec<Submission>, AppError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT id, tryout_id, user_id, score, submitted_at, finalized_at
            FROM submissions WHERE tryout_id = $1
            "#,
        )
        .bind(tryout_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Submission::from).collect())
    }

    async fn list_answers(&self, submission_id: Uuid) -> Result<Vec<Answer>, AppError> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT id, submission_id, question_id, choice_id, short_answer, is_correct
            FROM answers WHERE submission_id = $1
            "#,
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Answer::from).collect())
    }

    async fn replace_answers(
        &self,
        submission_id: Uuid,
        answers: &[Answer],
        submitted_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // FOR UPDATE serializes concurrent batches on the submission row
        // and pins the finalized check to this transaction.
        let row: Option<(Option<chrono::DateTime<chrono::Utc>>,)> =
            sqlx::query_as("SELECT finalized_at FROM submissions WHERE id = $1 FOR UPDATE")
                .bind(submission_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (finalized_at,) = row.ok_or_else(|| {
            AppError::NotFound(format!("Submission with ID {submission_id} not found"))
        })?;
        if finalized_at.is_some() {
            return Err(AppError::Locked(
                "Submission has already been finalized".to_string(),
            ));
        }

        let replaced: Vec<Uuid> = answers.iter().map(|a| a.question_id).collect();
        sqlx::query("DELETE FROM answers WHERE submission_id = $1 AND question_id = ANY($2)")
            .bind(submission_id)
            .bind(&replaced)
            .execute(&mut *tx)
            .await?;

        for a in answers {
            sqlx::query(
                r#"
                INSERT INTO answers (id, submission_id, question_id, choice_id, short_answer, is_correct)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(a.id)
            .bind(a.submission_id)
            .bind(a.question_id)
            .bind(a.choice_id)
            .bind(&a.short_answer)
            .bind(a.is_correct)
            .execute(&mut *tx)
            .await?;
        }

        // The score is the sum over the rows now present, computed in
        // the same transaction that wrote them.
        sqlx::query(
            r#"
            UPDATE submissions
            SET score = (
                SELECT COALESCE(SUM(q.score), 0)::int
                FROM answers a
                JOIN questions q ON q.id = a.question_id
                WHERE a.submission_id = $1 AND a.is_correct
            ),
                submitted_at = $2
            WHERE id = $1
            "#,
        )
        .bind(submission_id)
        .bind(submitted_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn finalize_submission(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE submissions SET finalized_at = $2, submitted_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Inserts one question and its choices inside an open transaction.
async fn insert_question(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    detail: &QuestionDetail,
) -> Result<(), AppError> {
    let q = &detail.question;
    sqlx::query(
        r#"
        INSERT INTO questions (id, tryout_id, text, score, type, correct_short_answer)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(q.id)
    .bind(q.tryout_id)
    .bind(&q.text)
    .bind(q.score)
    .bind(q.question_type.as_str())
    .bind(&q.correct_short_answer)
    .execute(&mut **tx)
    .await?;

    for c in &detail.choices {
        sqlx::query(
            r#"
            INSERT INTO choices (id, question_id, text, is_answer)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(c.id)
        .bind(c.question_id)
        .bind(&c.text)
        .bind(c.is_answer)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
