use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response};
use axum::middleware::Next;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

pub fn security_headers<B>(mut response: Response<B>) -> Response<B> {
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );

    response
}

pub async fn apply_security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let response = next.run(request).await;
    security_headers(response)
}

/// Counts failed attempts per key and locks the key out once `max_attempts` pile up
/// inside the lockout window.
pub struct RateLimiter {
    attempts: RwLock<HashMap<String, Vec<Instant>>>,
    max_attempts: usize,
    lockout: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(900))
    }
}

impl RateLimiter {
    pub fn new(max_attempts: usize, lockout: Duration) -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            max_attempts,
            lockout,
        }
    }

    fn entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Instant>>> {
        self.attempts.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// False while `key` is locked out.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut attempts = self.entries();

        let Some(entry) = attempts.get_mut(key) else {
            return true;
        };
        entry.retain(|t| now.duration_since(*t) < self.lockout);
        entry.len() < self.max_attempts
    }

    pub fn record_failure(&self, key: &str) {
        self.entries()
            .entry(key.to_string())
            .or_default()
            .push(Instant::now());
    }

    pub fn clear(&self, key: &str) {
        self.entries().remove(key);
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries().retain(|_, v| {
            v.retain(|t| now.duration_since(*t) < self.lockout);
            !v.is_empty()
        });
    }
}
