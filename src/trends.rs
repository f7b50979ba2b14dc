//! Trend topic extraction from the x.com "What's happening" sidebar.

use tracing::{debug, warn};

use crate::browser::ElementHandle;
use crate::selectors::SelectorTable;

/// Value stored for a trend slot that could not be filled.
pub const EMPTY_SLOT: &str = "N/A";

/// How many trend slots a record carries.
pub const TREND_SLOTS: usize = 5;

/// Labels the sidebar mixes into trend rows that are not topics.
const EXCLUDED_FRAGMENTS: [&str; 5] = ["Trending", "Entertainment", "Sports", "News", "posts"];

fn is_topic(text: &str) -> bool {
    !text.is_empty() && !EXCLUDED_FRAGMENTS.iter().any(|f| text.contains(f))
}

/// Pulls the topic name out of a single trend row.
///
/// A row carries several text spans (category, topic, post count). The topic
/// is the first span that matches none of the known non-topic fragments.
/// Failures are per-slot: an unreadable row yields the [`EMPTY_SLOT`]
/// sentinel instead of an error, so one broken row never sinks the run.
pub async fn extract_topic(row: &dyn ElementHandle, selectors: &SelectorTable) -> String {
    let spans = match row.query_all(&selectors.trend_text).await {
        Ok(spans) => spans,
        Err(e) => {
            warn!("trend row unreadable: {}", String::from(e));
            return EMPTY_SLOT.to_string();
        }
    };
    for span in &spans {
        let text = match span.text().await {
            Ok(t) => t.trim().to_string(),
            Err(e) => {
                debug!("unreadable span in trend row: {}", String::from(e));
                continue;
            }
        };
        if is_topic(&text) {
            return text;
        }
    }
    EMPTY_SLOT.to_string()
}
