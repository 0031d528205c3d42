// src/handlers/users.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{error::AppError, repository::Repository};

pub async fn list_users(
    State(repo): State<Arc<dyn Repository>>,
) -> Result<impl IntoResponse, AppError> {
    let users = repo.list_users().await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = repo
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}
