use crate::services::health;
use crate::web::error::AppResult;
use crate::web::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

/// GET /api/health
///
/// 503 while the article slug column is not uniquely constrained.
pub async fn health(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let schema = health::schema_health(&state.db)?;
    let (status, label) = if schema.is_healthy() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = serde_json::json!({
        "data": {
            "status": label,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "schema": schema,
        }
    });
    Ok((status, Json(body)).into_response())
}
