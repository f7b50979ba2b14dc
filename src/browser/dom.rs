//! DOM capability traits and the element wait utility.
//!
//! The login flow and trend extraction never touch the CDP driver directly;
//! they work against [`PageDriver`] and [`ElementHandle`] so the whole flow can
//! be exercised against fake markup in tests. The concrete implementations
//! live in `cdp.rs`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use super::BrowserError;

/// Poll interval for DOM condition waits.
pub const POLL_INTERVAL_MS: u64 = 250;

/// An opaque handle to one element on the live page.
///
/// Handles are positional: they re-resolve the element on every call, so a
/// handle stays usable across framework re-renders as long as the element
/// keeps its position in the selector's match list.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Rendered text content, untrimmed.
    async fn text(&self) -> Result<String, BrowserError>;

    async fn click(&self) -> Result<(), BrowserError>;

    async fn is_visible(&self) -> Result<bool, BrowserError>;

    async fn is_enabled(&self) -> Result<bool, BrowserError>;

    /// Clear any pre-filled value, then type `text` into the element.
    async fn clear_and_type(&self, text: &str) -> Result<(), BrowserError>;

    /// All descendants of this element matching `selector`, in document order.
    async fn query_all(&self, selector: &str)
        -> Result<Vec<Box<dyn ElementHandle>>, BrowserError>;
}

/// Page-level driver surface needed by the scrape flow.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str)
        -> Result<Vec<Box<dyn ElementHandle>>, BrowserError>;
}

/// Wait until an element matching `selector` exists AND is visible.
///
/// Presence alone does not satisfy the wait; hidden elements are skipped. One
/// poll loop per invocation, no retry. On timeout the error carries the
/// selector and the elapsed budget for diagnostics.
pub async fn wait_for_visible(
    page: &dyn PageDriver,
    selector: &str,
    timeout: Duration,
) -> Result<Box<dyn ElementHandle>, BrowserError> {
    let start = Instant::now();
    loop {
        for element in page.query_all(selector).await? {
            if element.is_visible().await? {
                return Ok(element);
            }
        }
        if start.elapsed() >= timeout {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
                waited_ms: timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Bounded probe variant of [`wait_for_visible`]: absence is not an error.
///
/// Used for optional steps (the login verification page) where "did not
/// appear in time" means "skip the step".
pub async fn try_wait_for_visible(
    page: &dyn PageDriver,
    selector: &str,
    timeout: Duration,
) -> Result<Option<Box<dyn ElementHandle>>, BrowserError> {
    match wait_for_visible(page, selector, timeout).await {
        Ok(element) => Ok(Some(element)),
        Err(BrowserError::ElementNotFound { selector, waited_ms }) => {
            debug!("Optional element {} not visible within {}ms", selector, waited_ms);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
