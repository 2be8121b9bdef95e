use crate::scrapers::espn_picks::ESPN_PICKS_URL;
use crate::scrapers::sportsbook::SPORTSBOOK_URL;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data-log.db";

/// Runtime settings, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub slate_url: String,
    pub picks_url: String,
    pub host: String,
    pub port: u16,
    pub refresh_interval: Duration,
    pub use_cache: bool,
    pub cache_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            slate_url: SPORTSBOOK_URL.to_string(),
            picks_url: ESPN_PICKS_URL.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            refresh_interval: Duration::from_secs(30),
            use_cache: false,
            cache_dir: PathBuf::from("cache"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(url) = lookup("SLATE_URL") {
            config.slate_url = url;
        }
        if let Some(url) = lookup("PICKS_URL") {
            config.picks_url = url;
        }
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {:?}", port))?;
        }
        if let Some(secs) = lookup("REFRESH_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("REFRESH_SECS is not a number: {:?}", secs))?;
            anyhow::ensure!(secs > 0, "REFRESH_SECS must be positive");
            config.refresh_interval = Duration::from_secs(secs);
        }
        config.use_cache = lookup("USE_CACHE").unwrap_or_default() == "1";
        if let Some(dir) = lookup("CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
