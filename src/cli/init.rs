use anyhow::Result;
use std::path::PathBuf;

pub async fn run(path: PathBuf, name: Option<String>) -> Result<()> {
    let site_name = name.unwrap_or_else(|| "Newsdesk".to_string());
    let config_path = path.join("newsdesk.toml");
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    std::fs::create_dir_all(path.join("data"))?;

    let config = format!(
        r#"[site]
title = "{}"
description = "News and analysis"
url = "http://localhost:3000"
language = "en"

[server]
host = "127.0.0.1"
port = 3000
# Browser origins allowed to call the API; empty allows any.
cors_origins = []
request_timeout_secs = 30

[database]
path = "./data/newsdesk.db"
pool_size = 10

[content]
default_page_size = 20
max_page_size = 100
featured_limit = 6

[auth]
session_hours = 8
secure_cookies = false
"#,
        site_name.replace('"', "\\\"")
    );

    std::fs::write(&config_path, config)?;

    tracing::info!("Created {:?}", config_path);
    tracing::info!("Run 'newsdesk user add --name <name> --email <email> --role admin' to create an administrator");
    tracing::info!("Run 'newsdesk serve' to migrate the database and start the API");

    Ok(())
}
