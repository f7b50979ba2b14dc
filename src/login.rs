//! The x.com login flow.
//!
//! The flow is staged: username, an optional identity verification prompt,
//! then password. Each stage waits for its field instead of sleeping, so a
//! slow challenge screen and a fast ordinary login both work. The one blind
//! wait left is the post-submit settle, because the redirect chain after
//! "Log in" has no stable element to key on.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::browser::dom::POLL_INTERVAL_MS;
use crate::browser::{try_wait_for_visible, wait_for_visible, BrowserError, ElementHandle, PageDriver};
use crate::error::ScrapeError;
use crate::selectors::SelectorTable;

#[derive(Debug, Clone)]
pub struct LoginFlowConfig {
    pub username: String,
    pub password: String,
    /// Phone number or email typed into the verification prompt when x.com
    /// challenges the login. `None` means the challenge cannot be answered.
    pub verification_identity: Option<String>,
    /// Wait for ordinary fields and buttons.
    pub field_timeout: Duration,
    /// The password screen can lag far behind the username submit.
    pub password_timeout: Duration,
    /// Short probe for the optional verification prompt.
    pub verification_probe: Duration,
    /// Wait for a disabled submit button to become clickable.
    pub button_enable_timeout: Duration,
    /// Blind wait after the final submit while redirects settle.
    pub post_login_settle: Duration,
}

impl Default for LoginFlowConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            verification_identity: None,
            field_timeout: Duration::from_secs(10),
            password_timeout: Duration::from_secs(50),
            verification_probe: Duration::from_secs(5),
            button_enable_timeout: Duration::from_secs(5),
            post_login_settle: Duration::from_secs(3),
        }
    }
}

enum LabelMatch {
    Exact,
    Contains,
}

pub struct LoginFlow {
    config: LoginFlowConfig,
    selectors: SelectorTable,
}

impl LoginFlow {
    pub fn new(config: LoginFlowConfig, selectors: SelectorTable) -> Self {
        Self { config, selectors }
    }

    /// Runs the full flow. On success the page is logged in and past the
    /// post-submit settle.
    pub async fn run(&self, page: &dyn PageDriver) -> Result<(), ScrapeError> {
        self.enter_username(page).await?;
        self.maybe_answer_verification(page).await?;
        self.enter_password(page).await?;
        info!("login submitted, letting redirects settle");
        sleep(self.config.post_login_settle).await;
        Ok(())
    }

    async fn enter_username(&self, page: &dyn PageDriver) -> Result<(), ScrapeError> {
        let field = wait_for_visible(page, &self.selectors.username_input, self.config.field_timeout)
            .await
            .map_err(layout_changed("username field never appeared"))?;
        field.clear_and_type(&self.config.username).await?;

        let next = self
            .find_button(page, "next", LabelMatch::Exact, self.config.field_timeout)
            .await?
            .ok_or_else(|| {
                ScrapeError::AuthenticationOrLayoutChanged(
                    "no Next button after username entry".to_string(),
                )
            })?;
        next.click().await?;
        Ok(())
    }

    /// The verification prompt only shows on logins x.com finds suspicious.
    /// Absence is the normal case and not an error.
    async fn maybe_answer_verification(&self, page: &dyn PageDriver) -> Result<(), ScrapeError> {
        let prompt = try_wait_for_visible(
            page,
            &self.selectors.verification_input,
            self.config.verification_probe,
        )
        .await?;
        let Some(prompt) = prompt else {
            debug!("no verification prompt, continuing to password");
            return Ok(());
        };

        info!("verification prompt detected");
        match &self.config.verification_identity {
            Some(identity) => prompt.clear_and_type(identity).await?,
            None => warn!("verification prompt shown but no identity configured"),
        }

        match self
            .find_button(page, "next", LabelMatch::Exact, self.config.field_timeout)
            .await?
        {
            Some(next) => {
                self.wait_until_enabled(&*next).await;
                next.click().await?;
            }
            // The prompt sometimes auto-advances once the field is filled.
            None => warn!("no Next button on verification prompt, continuing anyway"),
        }
        Ok(())
    }

    async fn enter_password(&self, page: &dyn PageDriver) -> Result<(), ScrapeError> {
        let field = wait_for_visible(
            page,
            &self.selectors.password_input,
            self.config.password_timeout,
        )
        .await
        .map_err(layout_changed("password field never appeared"))?;
        field.clear_and_type(&self.config.password).await?;

        let login = self
            .find_button(page, "log in", LabelMatch::Contains, self.config.field_timeout)
            .await?
            .ok_or_else(|| {
                ScrapeError::AuthenticationOrLayoutChanged(
                    "no Log in button after password entry".to_string(),
                )
            })?;
        login.click().await?;
        Ok(())
    }

    /// Polls for a visible `[role="button"]` whose text matches `label`.
    async fn find_button(
        &self,
        page: &dyn PageDriver,
        label: &str,
        matching: LabelMatch,
        timeout: Duration,
    ) -> Result<Option<Box<dyn ElementHandle>>, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            for button in page.query_all(&self.selectors.button_role).await? {
                if !button.is_visible().await.unwrap_or(false) {
                    continue;
                }
                let text = button.text().await.unwrap_or_default();
                let text = text.trim().to_ascii_lowercase();
                let hit = match matching {
                    LabelMatch::Exact => text == label,
                    LabelMatch::Contains => text.contains(label),
                };
                if hit {
                    return Ok(Some(button));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    /// Best effort: gives a disabled submit a moment to unlock, then moves on.
    async fn wait_until_enabled(&self, button: &dyn ElementHandle) {
        let deadline = Instant::now() + self.config.button_enable_timeout;
        while Instant::now() < deadline {
            if button.is_enabled().await.unwrap_or(true) {
                return;
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
        warn!("submit button still disabled after wait, clicking anyway");
    }
}

fn layout_changed(context: &'static str) -> impl Fn(BrowserError) -> ScrapeError {
    move |e| match e {
        BrowserError::ElementNotFound { .. } => {
            ScrapeError::AuthenticationOrLayoutChanged(context.to_string())
        }
        other => ScrapeError::Browser(other),
    }
}
