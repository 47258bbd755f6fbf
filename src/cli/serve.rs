use crate::{web, Config, Database};
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let db = Database::open_with_pool_size(&config.database.path, config.database.pool_size)?;

    // Serving against an unconstrained slug column is never allowed.
    db.migrate()
        .context("Database migration did not complete; refusing to start")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting server at http://{}", addr);

    let result = web::serve(config, db.clone(), &addr).await;
    db.close();
    result
}
