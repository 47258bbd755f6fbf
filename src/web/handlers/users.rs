use super::json_single;
use crate::models::{NewUser, UpdateUser, UserStatus};
use crate::services::auth;
use crate::web::error::{AppError, AppResult};
use crate::web::extractors::AdminUser;
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

/// GET /api/users
pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<serde_json::Value>> {
    Ok(json_single(auth::list_users(&state.db)?))
}

/// POST /api/users
pub async fn create(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(input): Json<NewUser>,
) -> AppResult<Response> {
    let user = auth::create_user(&state.db, &input)?;
    Ok((StatusCode::CREATED, json_single(user)).into_response())
}

/// PUT /api/users/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateUser>,
) -> AppResult<Json<serde_json::Value>> {
    if id == admin.id && input.status == Some(UserStatus::Inactive) {
        return Err(AppError::bad_request("You cannot deactivate your own account"));
    }
    let user = auth::update_user(&state.db, id, &input)?;
    Ok(json_single(user))
}

/// DELETE /api/users/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    if id == admin.id {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }
    if !auth::delete_user(&state.db, id)? {
        return Err(AppError::not_found("User not found"));
    }
    tracing::info!(id, by = admin.id, "User deleted");
    Ok(json_single(serde_json::json!({ "deleted": true, "id": id })))
}

/// POST /api/users/:id/toggle-status
pub async fn toggle_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    if id == admin.id {
        return Err(AppError::bad_request("You cannot change your own status"));
    }
    let user = auth::toggle_user_status(&state.db, id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(json_single(user))
}
