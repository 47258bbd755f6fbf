use super::{json_envelope, json_single, paginate, PaginationParams};
use crate::models::{SubscriberFilter, SubscriberStatus, Subscription};
use crate::services::newsletter;
use crate::web::error::{AppError, AppResult};
use crate::web::extractors::CurrentUser;
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    email: String,
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriberParams {
    pub status: Option<SubscriberStatus>,
    pub confirmed: Option<bool>,
    pub q: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// POST /api/newsletter/subscribe
///
/// Mail delivery is not handled here; the confirmation code is handed back to the caller.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(form): Json<SubscribeRequest>,
) -> AppResult<Response> {
    let outcome = newsletter::subscribe(&state.db, &form.email, form.name.as_deref())?;

    let response = match outcome {
        Subscription::Pending(sub) => (
            StatusCode::CREATED,
            json_single(serde_json::json!({
                "status": "pending",
                "email": sub.email,
                "confirmation_code": sub.confirmation_code,
            })),
        ),
        Subscription::Reactivated(sub) => (
            StatusCode::OK,
            json_single(serde_json::json!({
                "status": "reactivated",
                "email": sub.email,
                "confirmation_code": sub.confirmation_code,
            })),
        ),
        Subscription::AlreadySubscribed => (
            StatusCode::OK,
            json_single(serde_json::json!({ "status": "already_subscribed" })),
        ),
    };
    Ok(response.into_response())
}

/// GET /api/newsletter/confirm/:code
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let subscriber = newsletter::confirm(&state.db, &code)?
        .ok_or_else(|| AppError::not_found("Invalid or already used confirmation code"))?;
    Ok(json_single(subscriber))
}

/// POST /api/newsletter/unsubscribe
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Json(form): Json<UnsubscribeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if form.email.trim().is_empty() {
        return Err(AppError::bad_request("Email is required"));
    }
    if !newsletter::unsubscribe(&state.db, &form.email)? {
        return Err(AppError::not_found("No active subscription for this email"));
    }
    Ok(json_single(serde_json::json!({ "unsubscribed": true })))
}

/// GET /api/subscribers
pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(params): Query<SubscriberParams>,
) -> AppResult<Json<serde_json::Value>> {
    let (page, per_page, offset) = paginate(
        &PaginationParams {
            page: params.page,
            per_page: params.per_page,
        },
        &state.config.content,
    );
    let filter = SubscriberFilter {
        status: params.status,
        confirmed: params.confirmed,
        q: params.q,
    };
    let items = newsletter::list_subscribers(&state.db, &filter, per_page, offset)?;
    let total = newsletter::count_subscribers(&state.db, &filter)?;
    Ok(json_envelope(items, total, page, per_page))
}
