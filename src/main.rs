//! Trend Scraper - Standalone Web Server
//!
//! Runs the scraper behind an HTTP trigger endpoint.
//!
//! Environment variables:
//! - `TRENDS_USERNAME` / `TRENDS_PASSWORD` - x.com credentials (required)
//! - `TRENDS_VERIFICATION_ID` - identity typed into the verification prompt
//! - `DATABASE_URL` - Postgres connection string (required)
//! - `TRENDS_WEB_PORT` - Server port (default: 3000)
//! - `TRENDS_HEADLESS` - set to `false` to watch the browser
//! - `CHROME_EXECUTABLE` - Chrome binary override

use std::sync::Arc;

use tracing::info;

use trend_scraper::{init_logging, log_dir, web, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let _guard = init_logging();

    info!("Starting Trend Scraper (server mode)");

    if let Some(dir) = log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let config = AppConfig::from_env()?;
    let port = config.web_port;
    let state = Arc::new(AppState::from_config(&config));

    info!("Application state initialized");

    // Start the web server (blocks until shutdown)
    web::start_server(state, port).await?;

    Ok(())
}
