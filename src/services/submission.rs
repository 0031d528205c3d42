// src/services/submission.rs

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    error::AppError,
    models::submission::{Answer, AnswerDef, Submission, SubmissionDetail},
    repository::Repository,
    services::grading,
};

/// Opens a submission for (tryout, user). Idempotent: a second call for
/// the same pair returns the existing submission untouched; the storage
/// layer's insert-if-absent keeps this race-free under concurrency.
pub async fn create_submission(
    repo: &dyn Repository,
    tryout_id: Uuid,
    user_id: Uuid,
) -> Result<Submission, AppError> {
    repo.get_tryout(tryout_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tryout with ID {tryout_id} not found")))?;

    repo.find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with ID {user_id} not found")))?;

    let candidate = Submission {
        id: Uuid::new_v4(),
        tryout_id,
        user_id,
        score: 0,
        submitted_at: None,
        finalized_at: None,
    };

    repo.create_submission_if_absent(&candidate).await
}

/// Grades and records a batch of answers.
///
/// Each answer's question must belong to the submission's tryout.
/// Answers replace any earlier answer to the same question, and the
/// submission score is re-aggregated over the full answer set within
/// the storage transaction, so resubmitting never double-counts and
/// concurrent batches cannot store a stale total. Rejected once the
/// submission is finalized.
pub async fn submit_answers(
    repo: &dyn Repository,
    submission_id: Uuid,
    answers: &[AnswerDef],
) -> Result<SubmissionDetail, AppError> {
    if answers.is_empty() {
        return Err(AppError::BadRequest("No answers submitted".to_string()));
    }

    let submission = repo
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Submission with ID {submission_id} not found"))
        })?;

    if submission.is_finalized() {
        return Err(AppError::Locked(
            "Submission has already been finalized".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for a in answers {
        if !seen.insert(a.question_id) {
            return Err(AppError::Conflict(format!(
                "Duplicate answer for question {}",
                a.question_id
            )));
        }
    }

    let tryout = repo
        .get_tryout(submission.tryout_id)
        .await?
        .ok_or_else(|| {
            AppError::InternalServerError("Submission references a missing tryout".to_string())
        })?;

    let mut graded_answers = Vec::with_capacity(answers.len());
    for def in answers {
        let question = tryout
            .questions
            .iter()
            .find(|q| q.question.id == def.question_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Question with ID {} not found in this tryout",
                    def.question_id
                ))
            })?;

        let graded = grading::grade(question, def)?;

        graded_answers.push(Answer {
            id: Uuid::new_v4(),
            submission_id,
            question_id: def.question_id,
            choice_id: def.choice_id,
            short_answer: def.short_answer.clone(),
            is_correct: graded.is_correct,
        });
    }

    // The storage layer re-aggregates the score over the final answer
    // set inside the same transaction that writes it, and re-checks the
    // finalized flag there; the check above is only a fast path.
    repo.replace_answers(submission_id, &graded_answers, chrono::Utc::now())
        .await?;

    submission_detail(repo, submission_id).await
}

/// Marks a submission terminal. Idempotent: finalizing twice returns
/// the submission unchanged. Once finalized, answer intake is rejected.
pub async fn finalize_submission(
    repo: &dyn Repository,
    submission_id: Uuid,
) -> Result<Submission, AppError> {
    let submission = repo
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Submission with ID {submission_id} not found"))
        })?;

    if submission.is_finalized() {
        return Ok(submission);
    }

    repo.finalize_submission(submission_id, chrono::Utc::now())
        .await?;

    repo.get_submission(submission_id).await?.ok_or_else(|| {
        AppError::InternalServerError("Submission vanished after finalize".to_string())
    })
}

/// Loads a submission with its answers and derived lifecycle status.
pub async fn submission_detail(
    repo: &dyn Repository,
    submission_id: Uuid,
) -> Result<SubmissionDetail, AppError> {
    let submission = repo
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Submission with ID {submission_id} not found"))
        })?;

    let answers = repo.list_answers(submission_id).await?;
    let status = submission.status(answers.len());

    Ok(SubmissionDetail {
        submission,
        status,
        answers,
    })
}
