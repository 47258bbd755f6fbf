use super::json_single;
use crate::models::UserSummary;
use crate::services::auth;
use crate::web::error::{AppError, AppResult};
use crate::web::extractors::{OptionalUser, SESSION_COOKIE};
use crate::web::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(form): Json<LoginRequest>,
) -> AppResult<Response> {
    let email = form.email.trim().to_lowercase();
    if email.is_empty() || form.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    if !state.login_limiter.check(&email) {
        tracing::warn!(email = %email, "Login locked out after repeated failures");
        return Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many failed attempts, try again later",
        ));
    }

    let Some(user) = auth::authenticate(&state.db, &email, &form.password)? else {
        state.login_limiter.record_failure(&email);
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password",
        ));
    };
    state.login_limiter.clear(&email);

    let hours = state.config.auth.session_hours;
    let token = auth::create_session(&state.db, user.id, hours)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.auth.secure_cookies)
        .max_age(Duration::hours(hours))
        .build();

    tracing::info!(user_id = user.id, "User signed in");
    Ok((
        jar.add(cookie),
        json_single(serde_json::json!({ "user": UserSummary::from(&user) })),
    )
        .into_response())
}

/// POST /api/logout
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> AppResult<Response> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        auth::delete_session(&state.db, cookie.value())?;
    }

    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();

    Ok((
        jar.remove(cookie),
        json_single(serde_json::json!({ "signed_out": true })),
    )
        .into_response())
}

/// GET /api/check-session
pub async fn check_session(OptionalUser(user): OptionalUser) -> Json<serde_json::Value> {
    json_single(serde_json::json!({
        "authenticated": user.is_some(),
        "user": user.as_ref().map(UserSummary::from),
    }))
}
