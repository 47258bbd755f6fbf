pub mod articles;
pub mod auth;
pub mod categories;
pub mod health;
pub mod newsletter;
pub mod users;

use axum::response::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// Returns `(page, per_page, offset)` with `per_page` clamped to the configured bounds.
pub(crate) fn paginate(
    params: &PaginationParams,
    content: &crate::config::ContentConfig,
) -> (usize, usize, usize) {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = content.page_size(params.per_page);
    let offset = (page - 1) * per_page;
    (page, per_page, offset)
}

pub(crate) fn json_envelope<T: Serialize>(
    data: T,
    total: i64,
    page: usize,
    per_page: usize,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "data": data,
        "meta": {
            "total": total,
            "page": page,
            "per_page": per_page,
        }
    }))
}

pub(crate) fn json_single<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "data": data,
    }))
}
