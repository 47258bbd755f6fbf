use crate::web::security::RateLimiter;
use crate::{Config, Database};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub login_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        Self {
            config,
            db,
            login_limiter: RateLimiter::default(),
        }
    }
}
