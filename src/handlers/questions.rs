// src/handlers/questions.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{CreateQuestionRequest, UpdateQuestionRequest},
    repository::Repository,
    services::question,
};

pub async fn list_questions_by_tryout(
    State(repo): State<Arc<dyn Repository>>,
    Path(tryout_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let questions = repo.list_questions(tryout_id).await?;
    Ok(Json(questions))
}

pub async fn get_question(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let question = repo
        .get_question(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
    Ok(Json(question))
}

pub async fn create_question(
    State(repo): State<Arc<dyn Repository>>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let detail = question::create_question(repo.as_ref(), &payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn update_question(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let detail = question::update_question(repo.as_ref(), id, &payload).await?;
    Ok(Json(detail))
}

pub async fn delete_question(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    question::delete_question(repo.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
