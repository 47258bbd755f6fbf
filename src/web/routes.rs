use super::handlers;
use super::state::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/login", post(handlers::auth::login))
        .route("/api/logout", post(handlers::auth::logout))
        .route("/api/check-session", get(handlers::auth::check_session))
}

pub fn article_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/articles",
            get(handlers::articles::list).post(handlers::articles::create),
        )
        .route("/api/articles/featured", get(handlers::articles::featured))
        .route("/api/articles/search", get(handlers::articles::search))
        .route(
            "/api/articles/slug/:slug",
            get(handlers::articles::get_by_slug),
        )
        .route(
            "/api/articles/:id",
            get(handlers::articles::get)
                .put(handlers::articles::update)
                .delete(handlers::articles::archive),
        )
}

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/public/articles",
            get(handlers::articles::list_published),
        )
        .route("/api/public/featured", get(handlers::articles::featured))
        .route(
            "/api/public/categories",
            get(handlers::categories::list_public),
        )
        .route("/api/categories", get(handlers::categories::list))
        .route("/api/health", get(handlers::health::health))
}

pub fn newsletter_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/newsletter/subscribe",
            post(handlers::newsletter::subscribe),
        )
        .route(
            "/api/newsletter/confirm/:code",
            get(handlers::newsletter::confirm),
        )
        .route(
            "/api/newsletter/unsubscribe",
            post(handlers::newsletter::unsubscribe),
        )
        .route("/api/subscribers", get(handlers::newsletter::list))
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/users",
            get(handlers::users::list).post(handlers::users::create),
        )
        .route(
            "/api/users/:id",
            put(handlers::users::update).delete(handlers::users::delete),
        )
        .route(
            "/api/users/:id/toggle-status",
            post(handlers::users::toggle_status),
        )
}
