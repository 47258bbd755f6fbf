use super::{json_envelope, json_single, paginate, PaginationParams};
use crate::models::{Article, ArticleFilter, ArticleStatus, CreateArticle, UpdateArticle};
use crate::services::articles;
use crate::services::slug::base_slug;
use crate::web::error::{AppError, AppResult};
use crate::web::extractors::{AdminUser, CurrentUser};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub status: Option<ArticleStatus>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl ListParams {
    fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

/// An article as returned from a write, flagged when the stored slug is not the one
/// the request asked for.
#[derive(Serialize)]
struct WrittenArticle {
    #[serde(flatten)]
    article: Article,
    slug_adjusted: bool,
}

fn list_response(
    state: &AppState,
    filter: ArticleFilter,
    pagination: &PaginationParams,
) -> AppResult<Json<serde_json::Value>> {
    let (page, per_page, offset) = paginate(pagination, &state.config.content);
    let items = articles::list_articles(&state.db, &filter, per_page, offset)?;
    let total = articles::count_articles(&state.db, &filter)?;
    Ok(json_envelope(items, total, page, per_page))
}

/// GET /api/articles
pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<serde_json::Value>> {
    let pagination = params.pagination();
    let filter = ArticleFilter {
        category: params.category,
        status: params.status,
    };
    list_response(&state, filter, &pagination)
}

/// GET /api/public/articles
pub async fn list_published(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<serde_json::Value>> {
    let pagination = params.pagination();
    let filter = ArticleFilter {
        category: params.category,
        status: Some(ArticleStatus::Published),
    };
    list_response(&state, filter, &pagination)
}

/// GET /api/articles/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let article = articles::get_by_id(&state.db, id)?
        .ok_or_else(|| AppError::not_found("Article not found"))?;
    Ok(json_single(article))
}

/// GET /api/articles/slug/:slug
pub async fn get_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let article = articles::find_by_slug(&state.db, &slug)?
        .ok_or_else(|| AppError::not_found("Article not found"))?;
    Ok(json_single(article))
}

/// GET /api/articles/featured and /api/public/featured
pub async fn featured(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> AppResult<Json<serde_json::Value>> {
    let content = &state.config.content;
    let limit = params
        .limit
        .unwrap_or(content.featured_limit)
        .clamp(1, content.max_page_size);
    let items = articles::featured_articles(&state.db, limit)?;
    Ok(json_single(items))
}

/// GET /api/articles/search?q=
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<serde_json::Value>> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(AppError::bad_request("Search query 'q' is required"));
    }
    let limit = state.config.content.page_size(params.limit);
    let items = articles::search_articles(&state.db, &query, limit)?;
    Ok(json_single(items))
}

/// POST /api/articles
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(mut input): Json<CreateArticle>,
) -> AppResult<Response> {
    if input.author.trim().is_empty() {
        input.author = user.name.clone();
    }
    let requested = base_slug(&input.title, input.slug.as_deref());

    let article = articles::create_article(&state.db, input, Some(user.id))?;
    let slug_adjusted = article.slug != requested;

    Ok((
        StatusCode::CREATED,
        json_single(WrittenArticle {
            article,
            slug_adjusted,
        }),
    )
        .into_response())
}

/// PUT /api/articles/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateArticle>,
) -> AppResult<Json<serde_json::Value>> {
    let requested = input
        .slug
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| base_slug("", Some(s)));

    let article = articles::update_article(&state.db, id, input)?;
    let slug_adjusted = requested.is_some_and(|r| r != article.slug);

    Ok(json_single(WrittenArticle {
        article,
        slug_adjusted,
    }))
}

/// DELETE /api/articles/:id
///
/// Archives rather than deletes, so the slug stays reserved.
pub async fn archive(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    if !articles::archive_article(&state.db, id)? {
        return Err(AppError::not_found("Article not found"));
    }
    Ok(json_single(serde_json::json!({ "id": id, "status": ArticleStatus::Archived })))
}
