//! Error taxonomy for a scrape run.

use thiserror::Error;

use crate::browser::BrowserError;
use crate::db::StoreError;

/// Anything that can sink a scrape run, by pipeline stage.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("could not acquire a browser session: {0}")]
    SessionAcquisitionFailed(String),

    #[error("navigation to {url} did not settle within {waited_ms}ms")]
    NavigationTimeout { url: String, waited_ms: u64 },

    #[error("login flow broke, credentials rejected or page layout changed: {0}")]
    AuthenticationOrLayoutChanged(String),

    #[error("trends sidebar never appeared: {0}")]
    TrendsNotFound(String),

    #[error("public ip lookup failed: {0}")]
    IpLookupFailure(String),

    #[error("could not persist trend record: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
}
