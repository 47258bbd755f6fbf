use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed to call the API from a browser. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    #[serde(default = "default_featured_limit")]
    pub featured_limit: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            featured_limit: default_featured_limit(),
        }
    }
}

impl ContentConfig {
    /// Clamps a requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_hours")]
    pub session_hours: i64,
    /// Set the `Secure` attribute on the session cookie.
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_hours: default_session_hours(),
            secure_cookies: false,
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_pool_size() -> u32 {
    10
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_featured_limit() -> usize {
    6
}

fn default_session_hours() -> i64 {
    8
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}. Run `newsdesk init` to create one.",
                path.display(),
                e
            )
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            anyhow::bail!("database.path must not be empty");
        }
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be greater than 0");
        }
        if self.content.max_page_size == 0 || self.content.max_page_size > 500 {
            anyhow::bail!("content.max_page_size must be between 1 and 500");
        }
        if self.content.default_page_size == 0
            || self.content.default_page_size > self.content.max_page_size
        {
            anyhow::bail!("content.default_page_size must be between 1 and content.max_page_size");
        }
        if self.content.featured_limit == 0 {
            anyhow::bail!("content.featured_limit must be greater than 0");
        }
        if self.auth.session_hours <= 0 {
            anyhow::bail!("auth.session_hours must be greater than 0");
        }
        Ok(())
    }

    /// A configuration with defaults everywhere, pointing at `database_path`.
    pub fn with_database(database_path: impl Into<String>) -> Self {
        Self {
            site: SiteConfig {
                title: "Newsdesk".to_string(),
                description: String::new(),
                url: String::new(),
                language: default_language(),
            },
            server: ServerConfig::default(),
            database: DatabaseConfig {
                path: database_path.into(),
                pool_size: default_pool_size(),
            },
            content: ContentConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}
