// src/services/tryout.rs

use chrono::Duration;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::tryout::{CreateTryoutRequest, Tryout, TryoutDetail, UpdateTryoutRequest},
    repository::Repository,
    services::question::{build_question_detail, validate_question_def},
};

/// Creates a tryout, optionally with nested questions and choices.
///
/// Everything is validated before anything is written, and the nested
/// aggregate is persisted in a single transaction, so a failing
/// question definition leaves no partial tryout behind.
pub async fn create_tryout(
    repo: &dyn Repository,
    author_id: Uuid,
    req: &CreateTryoutRequest,
) -> Result<TryoutDetail, AppError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".to_string()));
    }

    let description = req.description.trim();
    if description.is_empty() {
        return Err(AppError::BadRequest("Description is required".to_string()));
    }

    if req.start_at >= req.end_at {
        return Err(AppError::BadRequest(
            "Start date must be earlier than end date".to_string(),
        ));
    }
    let duration = (req.end_at - req.start_at).num_minutes();

    repo.find_user(author_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with ID {author_id} not found")))?;

    for def in &req.questions {
        validate_question_def(
            def.question_type,
            &def.text,
            def.score,
            &def.choices,
            def.short_answer.as_deref(),
        )?;
    }

    let tryout_id = Uuid::new_v4();
    let detail = TryoutDetail {
        tryout: Tryout {
            id: tryout_id,
            title: title.to_string(),
            description: description.to_string(),
            category: req.category,
            duration,
            start_at: req.start_at,
            end_at: req.end_at,
            user_id: author_id,
        },
        questions: req
            .questions
            .iter()
            .map(|def| build_question_detail(tryout_id, def))
            .collect(),
    };

    repo.create_tryout(&detail).await?;

    repo.get_tryout(tryout_id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Tryout vanished after creation".to_string()))
}

/// Updates tryout metadata. Rejected once the exam has submissions.
///
/// The exam length is preserved across schedule changes: a new
/// `start_at` without a new `duration` shifts `end_at` by the existing
/// duration, while a new `duration` recomputes `end_at` from the
/// (possibly unchanged) `start_at`.
pub async fn update_tryout(
    repo: &dyn Repository,
    id: Uuid,
    req: &UpdateTryoutRequest,
) -> Result<TryoutDetail, AppError> {
    let existing = repo
        .get_tryout(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tryout with ID {id} not found")))?;

    if repo.count_submissions(id).await? > 0 {
        return Err(AppError::Locked(
            "Cannot update tryout with existing submissions".to_string(),
        ));
    }

    let mut tryout = existing.tryout;

    if let Some(title) = &req.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::BadRequest("Title is required".to_string()));
        }
        tryout.title = title.to_string();
    }

    if let Some(description) = &req.description {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::BadRequest("Description is required".to_string()));
        }
        tryout.description = description.to_string();
    }

    if let Some(category) = req.category {
        tryout.category = category;
    }

    if let Some(duration) = req.duration
        && duration <= 0
    {
        return Err(AppError::BadRequest(
            "Duration must be a positive number".to_string(),
        ));
    }

    match (req.start_at, req.duration) {
        (Some(start_at), Some(duration)) => {
            tryout.start_at = start_at;
            tryout.duration = duration;
            tryout.end_at = start_at + Duration::minutes(duration);
        }
        (Some(start_at), None) => {
            tryout.start_at = start_at;
            tryout.end_at = start_at + Duration::minutes(tryout.duration);
        }
        (None, Some(duration)) => {
            tryout.duration = duration;
            tryout.end_at = tryout.start_at + Duration::minutes(duration);
        }
        (None, None) => {}
    }

    repo.update_tryout(&tryout).await?;

    repo.get_tryout(id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Tryout vanished after update".to_string()))
}

/// Deletes a tryout and cascades to its questions and choices, in
/// dependency order, within one transaction. Rejected once the exam
/// has submissions.
pub async fn delete_tryout(repo: &dyn Repository, id: Uuid) -> Result<(), AppError> {
    repo.get_tryout(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tryout with ID {id} not found")))?;

    if repo.count_submissions(id).await? > 0 {
        return Err(AppError::Locked(
            "Cannot delete tryout with existing submissions".to_string(),
        ));
    }

    repo.delete_tryout(id).await
}
