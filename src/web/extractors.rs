use crate::models::User;
use crate::services::auth;
use crate::web::error::AppError;
use crate::web::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "session";

fn session_token(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

/// The signed-in user. Rejects with 401 when there is no valid session.
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let state = state.clone();
        let token = session_token(parts);
        Box::pin(async move {
            let token = token.ok_or_else(AppError::unauthorized)?;
            let user = auth::validate_session(&state.db, &token)?
                .ok_or_else(AppError::unauthorized)?;
            Ok(CurrentUser(user))
        })
    }
}

/// A signed-in administrator. Rejects with 401 without a session and 403 for other roles.
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let state = state.clone();
        let token = session_token(parts);
        Box::pin(async move {
            let token = token.ok_or_else(AppError::unauthorized)?;
            let user = auth::validate_session(&state.db, &token)?
                .ok_or_else(AppError::unauthorized)?;
            if !user.is_admin() {
                return Err(AppError::forbidden());
            }
            Ok(AdminUser(user))
        })
    }
}

pub struct OptionalUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for OptionalUser {
    type Rejection = std::convert::Infallible;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let state = state.clone();
        let token = session_token(parts);
        Box::pin(async move {
            let user = match token {
                Some(t) => auth::validate_session(&state.db, &t).ok().flatten(),
                None => None,
            };
            Ok(OptionalUser(user))
        })
    }
}
