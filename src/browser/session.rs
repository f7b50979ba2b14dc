//! Browser session management
//!
//! Launches and tears down the single Chrome instance a scrape run owns.
//! Exactly one session exists per run; the orchestrator releases it on every
//! exit path.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cdp::CdpPage;
use super::dom::PageDriver;
use super::BrowserError;

/// Global counter for sequential session naming (Session-1, Session-2, ...)
static SESSION_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Fixed realistic user agent; headless Chrome advertises "HeadlessChrome"
/// otherwise, which the target site treats as a bot signal.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Find a usable Chrome/Chromium executable.
///
/// Resolution order: `CHROME_EXECUTABLE` env override, PATH scan, then
/// OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "chrome",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// Configuration for a browser session
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSessionConfig {
    /// Path to Chrome/Chromium executable; auto-detected when unset
    pub chrome_path: Option<String>,
    /// Run in headless mode
    pub headless: bool,
    /// User agent presented to the target site
    pub user_agent: String,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// One live, exclusively-owned browser for the duration of a scrape run.
#[async_trait]
pub trait ScrapeSession: Send + Sync {
    fn page(&self) -> &dyn PageDriver;

    /// Tear the browser down. Safe to call more than once; never fails the run.
    async fn release(&self);
}

/// Creates sessions for the orchestrator. Behind a trait so flow tests can
/// substitute a fake session and verify release behavior.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn ScrapeSession>, BrowserError>;
}

/// Factory launching real Chrome sessions over CDP.
pub struct ChromeSessionFactory {
    config: BrowserSessionConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: BrowserSessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn acquire(&self) -> Result<Box<dyn ScrapeSession>, BrowserError> {
        let session = CdpSession::launch(self.config.clone()).await?;
        Ok(Box::new(session))
    }
}

/// A live CDP browser session
pub struct CdpSession {
    id: String,
    browser: Mutex<Option<Browser>>,
    page: CdpPage,
    handler_task: tokio::task::JoinHandle<()>,
    alive: Arc<AtomicBool>,
    released: AtomicBool,
}

impl CdpSession {
    /// Launch Chrome with the unattended-operation flag set.
    pub async fn launch(config: BrowserSessionConfig) -> Result<Self, BrowserError> {
        let session_id = format!(
            "Session-{}",
            SESSION_COUNTER.fetch_add(1, Ordering::Relaxed)
        );

        let exe = match config.chrome_path.clone().or_else(find_chrome_executable) {
            Some(path) => path,
            None => {
                return Err(BrowserError::LaunchFailed(
                    "No Chrome/Chromium executable found. Install Chrome or set CHROME_EXECUTABLE."
                        .to_string(),
                ))
            }
        };

        info!(
            "Launching browser session {} (headless: {}, exe: {})",
            session_id, config.headless, exe
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&exe)
            .window_size(config.window_width, config.window_height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-notifications")
            .arg("--ignore-certificate-errors")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            // Hides navigator.webdriver at the engine level
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", config.user_agent));

        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // When the handler stream ends, Chrome has disconnected or crashed.
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_handler = alive.clone();
        let handler_id = session_id.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Session {} CDP handler error: {}", handler_id, e);
                }
            }
            warn!("Session {} Chrome disconnected (event handler ended)", handler_id);
            alive_for_handler.store(false, Ordering::Relaxed);
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        info!("Browser session {} created", session_id);

        Ok(Self {
            id: session_id,
            browser: Mutex::new(Some(browser)),
            page: CdpPage::new(page),
            handler_task,
            alive,
            released: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ScrapeSession for CdpSession {
    fn page(&self) -> &dyn PageDriver {
        &self.page
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        self.alive.store(false, Ordering::Relaxed);

        // Close the page first, then the browser process.
        let _ = self.page.raw_page().clone().close().await;

        let mut browser = self.browser.lock().await;
        if let Some(mut b) = browser.take() {
            if let Err(e) = b.close().await {
                warn!("Session {} browser close error (non-fatal): {}", self.id, e);
            }
        }

        self.handler_task.abort();
        info!("Browser session {} released", self.id);
    }
}
