mod error;
mod extractors;
mod handlers;
mod routes;
pub mod security;
mod state;

pub use error::{AppError, AppResult, HttpError};
pub use state::AppState;

use crate::{Config, Database};
use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Builds the full API router over an already-migrated database.
pub fn router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(routes::auth_routes())
        .merge(routes::article_routes())
        .merge(routes::public_routes())
        .merge(routes::newsletter_routes())
        .merge(routes::user_routes())
        .layer(middleware::from_fn(security::apply_security_headers))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(allowed).allow_credentials(true)
}

pub async fn serve(config: Config, db: Database, addr: &str) -> Result<()> {
    let state = Arc::new(AppState::new(config, db.clone()));

    let sweeper_state = state.clone();
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match crate::services::auth::cleanup_expired_sessions(&sweeper_state.db) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Expired sessions removed"),
                Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
            }
            sweeper_state.login_limiter.cleanup();
        }
    });

    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
