//! The scrape orchestrator: one call walks login, extraction and persistence.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{error, info};

use crate::browser::dom::POLL_INTERVAL_MS;
use crate::browser::{wait_for_visible, BrowserError, PageDriver, SessionFactory};
use crate::db::{StoredTrendRecord, TrendRecord, TrendStore};
use crate::error::ScrapeError;
use crate::login::{LoginFlow, LoginFlowConfig};
use crate::selectors::SelectorTable;
use crate::trends::{extract_topic, TREND_SLOTS};

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub login_url: String,
    /// Substring the page title must carry before the login flow starts.
    pub page_identity: String,
    pub ip_endpoint: String,
    pub navigation_timeout: Duration,
    pub trends_timeout: Duration,
    pub login: LoginFlowConfig,
    pub selectors: SelectorTable,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            login_url: "https://x.com/i/flow/login".to_string(),
            page_identity: "X".to_string(),
            ip_endpoint: "https://api.ipify.org?format=json".to_string(),
            navigation_timeout: Duration::from_secs(20),
            trends_timeout: Duration::from_secs(20),
            login: LoginFlowConfig::default(),
            selectors: SelectorTable::default(),
        }
    }
}

/// What the trigger endpoint reports back to its caller.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ScrapeOutcome {
    Success {
        success: bool,
        data: StoredTrendRecord,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl ScrapeOutcome {
    pub fn success(data: StoredTrendRecord) -> Self {
        Self::Success {
            success: true,
            data,
        }
    }

    pub fn failure(err: &ScrapeError) -> Self {
        Self::Failure {
            success: false,
            error: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Deserialize)]
struct IpResponse {
    ip: String,
}

pub struct Scraper {
    config: ScrapeConfig,
    sessions: Arc<dyn SessionFactory>,
    store: Arc<dyn TrendStore>,
    http: reqwest::Client,
}

impl Scraper {
    pub fn new(
        config: ScrapeConfig,
        sessions: Arc<dyn SessionFactory>,
        store: Arc<dyn TrendStore>,
    ) -> Self {
        Self {
            config,
            sessions,
            store,
            http: reqwest::Client::new(),
        }
    }

    /// Runs one scrape and folds the result into the wire outcome.
    pub async fn run(&self) -> ScrapeOutcome {
        match self.scrape().await {
            Ok(stored) => {
                info!(scrape_id = %stored.scrape_id, "scrape stored");
                ScrapeOutcome::success(stored)
            }
            Err(e) => {
                error!("scrape failed: {e}");
                ScrapeOutcome::failure(&e)
            }
        }
    }

    async fn scrape(&self) -> Result<StoredTrendRecord, ScrapeError> {
        self.store.connect().await?;

        let session = self
            .sessions
            .acquire()
            .await
            .map_err(|e| ScrapeError::SessionAcquisitionFailed(String::from(e)))?;

        // The session is released no matter how the run ends.
        let result = self.drive(session.page()).await;
        session.release().await;
        result
    }

    async fn drive(&self, page: &dyn PageDriver) -> Result<StoredTrendRecord, ScrapeError> {
        page.goto(&self.config.login_url).await?;
        self.wait_for_identity(page).await?;

        LoginFlow::new(self.config.login.clone(), self.config.selectors.clone())
            .run(page)
            .await?;

        let topics = self.extract_trends(page).await?;
        let ip = self.detect_public_ip().await?;

        let record = TrendRecord::new(topics, ip);
        let stored = self.store.save(&record).await?;
        Ok(stored)
    }

    /// Polls the document title until it carries the expected identity.
    async fn wait_for_identity(&self, page: &dyn PageDriver) -> Result<(), ScrapeError> {
        let deadline = Instant::now() + self.config.navigation_timeout;
        loop {
            if let Ok(title) = page.title().await {
                if title.contains(&self.config.page_identity) {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::NavigationTimeout {
                    url: self.config.login_url.clone(),
                    waited_ms: self.config.navigation_timeout.as_millis() as u64,
                });
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn extract_trends(&self, page: &dyn PageDriver) -> Result<Vec<String>, ScrapeError> {
        wait_for_visible(page, &self.config.selectors.trend_row, self.config.trends_timeout)
            .await
            .map_err(|e| match e {
                BrowserError::ElementNotFound { waited_ms, .. } => ScrapeError::TrendsNotFound(
                    format!("no trend rows after {waited_ms}ms"),
                ),
                other => ScrapeError::Browser(other),
            })?;

        let rows = page.query_all(&self.config.selectors.trend_row).await?;
        let mut topics = Vec::with_capacity(TREND_SLOTS);
        for row in rows.iter().take(TREND_SLOTS) {
            topics.push(extract_topic(row.as_ref(), &self.config.selectors).await);
        }
        info!("extracted {} trend rows", topics.len());
        Ok(topics)
    }

    async fn detect_public_ip(&self) -> Result<String, ScrapeError> {
        let response = self
            .http
            .get(&self.config.ip_endpoint)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ScrapeError::IpLookupFailure(e.to_string()))?;
        let body: IpResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::IpLookupFailure(e.to_string()))?;
        Ok(body.ip)
    }
}
