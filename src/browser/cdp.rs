//! `chromiumoxide`-backed implementations of the DOM capability traits.
//!
//! Elements are addressed by a JS locator expression
//! (`document.querySelectorAll(sel)[i]`) that is re-evaluated on every call
//! instead of holding a CDP node id. The target site re-renders aggressively
//! during the login flow and stale node ids were the dominant failure mode of
//! handle-based drivers there.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use rand::Rng;

use super::dom::{ElementHandle, PageDriver};
use super::BrowserError;

/// Upper bound on waiting for the load event after navigation.
const NAVIGATION_SETTLE_SECS: u64 = 30;

async fn eval(page: &Page, js: String) -> Result<serde_json::Value, BrowserError> {
    let result = page
        .evaluate(js)
        .await
        .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
    Ok(result
        .into_value::<serde_json::Value>()
        .unwrap_or(serde_json::Value::Null))
}

/// JSON-escape a CSS selector for safe embedding in an evaluated script.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Page driver over a live CDP page.
#[derive(Clone)]
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub(crate) fn raw_page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        // Best effort: the page identity / element waits are the real signal.
        let _ = tokio::time::timeout(
            Duration::from_secs(NAVIGATION_SETTLE_SECS),
            self.page.wait_for_navigation(),
        )
        .await;

        Ok(())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let value = eval(&self.page, "document.title".to_string()).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn query_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Box<dyn ElementHandle>>, BrowserError> {
        let sel = js_string(selector);
        let count = eval(
            &self.page,
            format!("document.querySelectorAll({sel}).length"),
        )
        .await?
        .as_u64()
        .unwrap_or(0);

        Ok((0..count)
            .map(|i| {
                Box::new(CdpElement {
                    page: self.page.clone(),
                    locator: format!("document.querySelectorAll({sel})[{i}]"),
                }) as Box<dyn ElementHandle>
            })
            .collect())
    }
}

/// One positionally-addressed element on a CDP page.
pub struct CdpElement {
    page: Page,
    locator: String,
}

impl CdpElement {
    /// Evaluate `body` with `el` bound to this element's current DOM node.
    async fn eval_on_self(&self, body: &str) -> Result<serde_json::Value, BrowserError> {
        let js = format!("(() => {{ const el = {}; {} }})()", self.locator, body);
        eval(&self.page, js).await
    }
}

#[async_trait]
impl ElementHandle for CdpElement {
    async fn text(&self) -> Result<String, BrowserError> {
        let value = self
            .eval_on_self("return el ? (el.innerText || el.textContent || '') : '';")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click(&self) -> Result<(), BrowserError> {
        let clicked = self
            .eval_on_self(
                r#"
                if (!el) return false;
                el.scrollIntoView({ block: 'center' });
                el.dispatchEvent(new MouseEvent('mouseover', { bubbles: true }));
                el.dispatchEvent(new MouseEvent('mousedown', { bubbles: true }));
                el.dispatchEvent(new MouseEvent('mouseup', { bubbles: true }));
                el.click();
                return true;
                "#,
            )
            .await?;

        if clicked.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(BrowserError::InteractionFailed(format!(
                "click target vanished: {}",
                self.locator
            )))
        }
    }

    async fn is_visible(&self) -> Result<bool, BrowserError> {
        let value = self
            .eval_on_self(
                "return !!(el && el.offsetParent !== null && el.offsetWidth > 0);",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self) -> Result<bool, BrowserError> {
        let value = self
            .eval_on_self(
                "return !!el && !el.disabled && el.getAttribute('aria-disabled') !== 'true';",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn clear_and_type(&self, text: &str) -> Result<(), BrowserError> {
        // Brief pause before touching the field, like a hand moving to it.
        let pre_delay = rand::thread_rng().gen_range(100..300);
        tokio::time::sleep(Duration::from_millis(pre_delay)).await;

        // Writes go through the native value setter with per-character input
        // events so framework-controlled inputs pick the value up.
        let body = format!(
            r#"
            if (!el) return false;
            el.focus();
            el.click();
            const proto = el.tagName === 'TEXTAREA'
                ? window.HTMLTextAreaElement.prototype
                : window.HTMLInputElement.prototype;
            const setter = Object.getOwnPropertyDescriptor(proto, 'value')?.set;
            const write = (v) => {{
                if (setter) setter.call(el, v); else el.value = v;
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            }};
            write('');
            const text = {text};
            return (async () => {{
                for (let i = 0; i < text.length; i++) {{
                    await new Promise(r => setTimeout(r, 40 + Math.random() * 80));
                    write(el.value + text[i]);
                }}
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})();
            "#,
            text = js_string(text),
        );

        let typed = self.eval_on_self(&body).await?;
        if typed.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(BrowserError::InteractionFailed(format!(
                "input vanished before typing: {}",
                self.locator
            )))
        }
    }

    async fn query_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Box<dyn ElementHandle>>, BrowserError> {
        let sel = js_string(selector);
        let count = self
            .eval_on_self(&format!(
                "return el ? el.querySelectorAll({sel}).length : 0;"
            ))
            .await?
            .as_u64()
            .unwrap_or(0);

        Ok((0..count)
            .map(|i| {
                Box::new(CdpElement {
                    page: self.page.clone(),
                    locator: format!("{}.querySelectorAll({sel})[{i}]", self.locator),
                }) as Box<dyn ElementHandle>
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_selectors() {
        assert_eq!(js_string(r#"input[name="password"]"#), r#""input[name=\"password\"]""#);
        assert_eq!(js_string("plain"), "\"plain\"");
    }
}
