//! Chrome automation layer.
//!
//! Sessions own a headless Chrome process and hand out a [`PageDriver`] for
//! the flows above them. Element access goes through [`ElementHandle`] so
//! the login and extraction logic never touches CDP types directly.

pub mod cdp;
pub mod dom;
pub mod errors;
pub mod session;

#[cfg(test)]
pub mod fake;

pub use cdp::{CdpElement, CdpPage};
pub use dom::{try_wait_for_visible, wait_for_visible, ElementHandle, PageDriver};
pub use errors::BrowserError;
pub use session::{
    find_chrome_executable, BrowserSessionConfig, ChromeSessionFactory, ScrapeSession,
    SessionFactory,
};
