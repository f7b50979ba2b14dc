//! Trend Scraper
//!
//! Drives an authenticated Chrome session against x.com, extracts the top
//! five trending topics and persists each capture with the scraper's public
//! IP. Scrapes are triggered over HTTP.

pub mod browser;
pub mod db;
pub mod error;
pub mod login;
pub mod scrape;
pub mod selectors;
pub mod trends;
pub mod web;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;

use browser::{BrowserSessionConfig, ChromeSessionFactory};
use db::PgTrendStore;
use login::LoginFlowConfig;
use scrape::{ScrapeConfig, Scraper};

/// Application configuration, read from the environment (a `.env` file is
/// honored through dotenvy in the binary).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub username: String,
    pub password: String,
    pub verification_identity: Option<String>,
    pub database_url: String,
    pub headless: bool,
    pub chrome_executable: Option<String>,
    pub web_port: u16,
    pub login_url: Option<String>,
    pub ip_endpoint: Option<String>,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_required(key: &str) -> anyhow::Result<String> {
    env_opt(key).with_context(|| format!("{key} must be set"))
}

fn parse_bool(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "0" | "false" | "no")
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            username: env_required("TRENDS_USERNAME")?,
            password: env_required("TRENDS_PASSWORD")?,
            verification_identity: env_opt("TRENDS_VERIFICATION_ID"),
            database_url: env_required("DATABASE_URL")?,
            headless: env_opt("TRENDS_HEADLESS")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
            chrome_executable: env_opt("CHROME_EXECUTABLE"),
            web_port: env_opt("TRENDS_WEB_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            login_url: env_opt("TRENDS_LOGIN_URL"),
            ip_endpoint: env_opt("TRENDS_IP_ENDPOINT"),
        })
    }

    pub fn session_config(&self) -> BrowserSessionConfig {
        BrowserSessionConfig {
            chrome_path: self.chrome_executable.clone(),
            headless: self.headless,
            ..BrowserSessionConfig::default()
        }
    }

    pub fn scrape_config(&self) -> ScrapeConfig {
        let mut config = ScrapeConfig {
            login: LoginFlowConfig {
                username: self.username.clone(),
                password: self.password.clone(),
                verification_identity: self.verification_identity.clone(),
                ..LoginFlowConfig::default()
            },
            ..ScrapeConfig::default()
        };
        if let Some(url) = &self.login_url {
            config.login_url = url.clone();
        }
        if let Some(endpoint) = &self.ip_endpoint {
            config.ip_endpoint = endpoint.clone();
        }
        config
    }
}

/// Shared application state behind the web server.
pub struct AppState {
    pub scraper: Scraper,
    /// Held for the duration of a scrape so concurrent triggers are refused.
    pub scrape_gate: Mutex<()>,
}

impl AppState {
    pub fn new(scraper: Scraper) -> Self {
        Self {
            scraper,
            scrape_gate: Mutex::new(()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let factory = Arc::new(ChromeSessionFactory::new(config.session_config()));
        let store = Arc::new(PgTrendStore::new(config.database_url.clone()));
        Self::new(Scraper::new(config.scrape_config(), factory, store))
    }
}

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("trend-scraper").join("logs"))
}

/// Initialize logging to console and a daily rolling file.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "trend-scraper.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}
