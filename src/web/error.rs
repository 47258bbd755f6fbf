use crate::error::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// An error that already knows which status it should be reported with.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

pub struct AppError(anyhow::Error);

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self(
            HttpError {
                status,
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Sign in required")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Administrator access required")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn status(&self) -> StatusCode {
        if let Some(http) = self.0.downcast_ref::<HttpError>() {
            return http.status;
        }
        match self.0.downcast_ref::<StoreError>() {
            Some(StoreError::MissingField(_) | StoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            Some(StoreError::NotFound) => StatusCode::NOT_FOUND,
            Some(StoreError::DuplicateSlug(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("Application error: {:?}", self.0);
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;
