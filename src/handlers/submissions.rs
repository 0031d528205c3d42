// src/handlers/submissions.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::submission::{CreateSubmissionRequest, SubmitAnswersRequest},
    repository::Repository,
    services::submission,
    utils::jwt::Claims,
};

/// Opens a submission for the authenticated caller. Idempotent: an
/// existing submission for the same tryout is returned as-is.
pub async fn create_submission(
    State(repo): State<Arc<dyn Repository>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let sub = submission::create_submission(repo.as_ref(), payload.tryout_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(sub)))
}

pub async fn get_submission(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = submission::submission_detail(repo.as_ref(), id).await?;
    Ok(Json(detail))
}

pub async fn list_submissions_by_user(
    State(repo): State<Arc<dyn Repository>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subs = repo.list_submissions_by_user(user_id).await?;
    Ok(Json(subs))
}

pub async fn list_submissions_by_tryout(
    State(repo): State<Arc<dyn Repository>>,
    Path(tryout_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subs = repo.list_submissions_by_tryout(tryout_id).await?;
    Ok(Json(subs))
}

pub async fn get_submission_by_tryout_and_user(
    State(repo): State<Arc<dyn Repository>>,
    Path((tryout_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let sub = repo
        .find_submission(tryout_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;
    Ok(Json(sub))
}

/// Grades a batch of answers and returns the updated submission with
/// its answers and recomputed score.
pub async fn submit_answers(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let detail = submission::submit_answers(repo.as_ref(), id, &payload.answers).await?;
    Ok(Json(detail))
}

/// Marks the submission terminal; no further answers are accepted.
pub async fn finalize_submission(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let sub = submission::finalize_submission(repo.as_ref(), id).await?;
    Ok(Json(sub))
}
