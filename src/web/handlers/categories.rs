use super::json_single;
use crate::services::{articles, categories};
use crate::web::error::AppResult;
use crate::web::extractors::CurrentUser;
use crate::web::state::AppState;
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;

/// GET /api/public/categories
pub async fn list_public(State(state): State<Arc<AppState>>) -> AppResult<Json<serde_json::Value>> {
    Ok(json_single(categories::list_categories(&state.db)?))
}

/// GET /api/categories
///
/// Also reports published counts for every category string in use, including ones
/// missing from the category table.
pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let items = categories::list_categories(&state.db)?;
    let counts = articles::count_by_category(&state.db)?;
    Ok(Json(serde_json::json!({
        "data": items,
        "meta": { "published_by_category": counts },
    })))
}
