// src/handlers/tryouts.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::tryout::{Category, CreateTryoutRequest, UpdateTryoutRequest},
    repository::Repository,
    services::tryout,
    utils::jwt::Claims,
};

pub async fn list_tryouts(
    State(repo): State<Arc<dyn Repository>>,
) -> Result<impl IntoResponse, AppError> {
    let tryouts = repo.list_tryouts().await?;
    Ok(Json(tryouts))
}

/// Returns the full aggregate: tryout plus nested questions and choices.
pub async fn get_tryout(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = repo
        .get_tryout(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tryout not found".to_string()))?;
    Ok(Json(detail))
}

/// Case-insensitive title substring search.
pub async fn find_tryouts_by_title(
    State(repo): State<Arc<dyn Repository>>,
    Path(title): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tryouts = repo.find_tryouts_by_title(&title).await?;
    Ok(Json(tryouts))
}

pub async fn find_tryouts_by_category(
    State(repo): State<Arc<dyn Repository>>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let category = category
        .parse::<Category>()
        .map_err(|_| AppError::BadRequest(format!("Invalid category: {category}")))?;
    let tryouts = repo.find_tryouts_by_category(category).await?;
    Ok(Json(tryouts))
}

/// Creates a tryout authored by the authenticated caller, optionally
/// with nested questions.
pub async fn create_tryout(
    State(repo): State<Arc<dyn Repository>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTryoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let author_id = claims.user_id()?;
    let detail = tryout::create_tryout(repo.as_ref(), author_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn update_tryout(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTryoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let detail = tryout::update_tryout(repo.as_ref(), id, &payload).await?;
    Ok(Json(detail))
}

pub async fn delete_tryout(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    tryout::delete_tryout(repo.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
