//! Fake page/element/session doubles for flow tests.
//!
//! Markup is modeled as phases: a map from selector to element list per page
//! state. Clicking an element flagged with `advances` bumps the phase counter,
//! which is how tests model the login flow's page transitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::dom::{ElementHandle, PageDriver};
use super::session::{ScrapeSession, SessionFactory};
use super::BrowserError;

pub struct FakeElement {
    label: String,
    visible: bool,
    enabled: bool,
    advance: Option<Arc<AtomicUsize>>,
    children: HashMap<String, Vec<Arc<FakeElement>>>,
    fail_children: Option<String>,
    pub clicks: AtomicUsize,
    pub typed: Mutex<Vec<String>>,
}

impl FakeElement {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            visible: true,
            enabled: true,
            advance: None,
            children: HashMap::new(),
            fail_children: None,
            clicks: AtomicUsize::new(0),
            typed: Mutex::new(Vec::new()),
        }
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Clicking this element advances the page to the next phase.
    pub fn advances(mut self, phase: &Arc<AtomicUsize>) -> Self {
        self.advance = Some(phase.clone());
        self
    }

    pub fn with_children(mut self, selector: &str, children: Vec<Arc<FakeElement>>) -> Self {
        self.children.insert(selector.to_string(), children);
        self
    }

    /// Descendant queries on this element fail, as on a detached node.
    pub fn failing_children(mut self, message: &str) -> Self {
        self.fail_children = Some(message.to_string());
        self
    }

    pub fn click_count(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    pub fn typed_values(&self) -> Vec<String> {
        self.typed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ElementHandle for Arc<FakeElement> {
    async fn text(&self) -> Result<String, BrowserError> {
        Ok(self.label.clone())
    }

    async fn click(&self) -> Result<(), BrowserError> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        if let Some(phase) = &self.advance {
            phase.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn is_visible(&self) -> Result<bool, BrowserError> {
        Ok(self.visible)
    }

    async fn is_enabled(&self) -> Result<bool, BrowserError> {
        Ok(self.enabled)
    }

    async fn clear_and_type(&self, text: &str) -> Result<(), BrowserError> {
        self.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn query_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Box<dyn ElementHandle>>, BrowserError> {
        if let Some(msg) = &self.fail_children {
            return Err(BrowserError::JavaScriptError(msg.clone()));
        }
        Ok(self
            .children
            .get(selector)
            .map(|els| {
                els.iter()
                    .map(|e| Box::new(e.clone()) as Box<dyn ElementHandle>)
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub struct FakePage {
    phase: Arc<AtomicUsize>,
    phases: Mutex<Vec<HashMap<String, Vec<Arc<FakeElement>>>>>,
    title: Mutex<String>,
    pub visited: Mutex<Vec<String>>,
    pub fail_goto: Option<String>,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(AtomicUsize::new(0)),
            phases: Mutex::new(Vec::new()),
            title: Mutex::new(String::new()),
            visited: Mutex::new(Vec::new()),
            fail_goto: None,
        }
    }

    /// Convenience for pages whose markup never changes.
    pub fn single_phase(entries: Vec<(&str, Vec<Arc<FakeElement>>)>) -> Self {
        let page = Self::new();
        page.push_phase(entries);
        page
    }

    pub fn with_title(self, title: &str) -> Self {
        *self.title.lock().unwrap() = title.to_string();
        self
    }

    pub fn failing_navigation(mut self, message: &str) -> Self {
        self.fail_goto = Some(message.to_string());
        self
    }

    /// Counter shared with elements built via [`FakeElement::advances`].
    pub fn phase_handle(&self) -> Arc<AtomicUsize> {
        self.phase.clone()
    }

    pub fn push_phase(&self, entries: Vec<(&str, Vec<Arc<FakeElement>>)>) {
        let map = entries
            .into_iter()
            .map(|(sel, els)| (sel.to_string(), els))
            .collect();
        self.phases.lock().unwrap().push(map);
    }

    fn current_phase(&self) -> HashMap<String, Vec<Arc<FakeElement>>> {
        let phases = self.phases.lock().unwrap();
        if phases.is_empty() {
            return HashMap::new();
        }
        let idx = self.phase.load(Ordering::SeqCst).min(phases.len() - 1);
        phases[idx].clone()
    }
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        if let Some(msg) = &self.fail_goto {
            return Err(BrowserError::NavigationFailed(msg.clone()));
        }
        self.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.title.lock().unwrap().clone())
    }

    async fn query_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Box<dyn ElementHandle>>, BrowserError> {
        Ok(self
            .current_phase()
            .get(selector)
            .map(|els| {
                els.iter()
                    .map(|e| Box::new(e.clone()) as Box<dyn ElementHandle>)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Session double that records how often it was released.
pub struct FakeSession {
    page: Arc<FakePage>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl ScrapeSession for FakeSession {
    fn page(&self) -> &dyn PageDriver {
        &*self.page
    }

    async fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeSessionFactory {
    page: Arc<FakePage>,
    pub released: Arc<AtomicUsize>,
    pub fail_acquire: bool,
}

impl FakeSessionFactory {
    pub fn new(page: Arc<FakePage>) -> Self {
        Self {
            page,
            released: Arc::new(AtomicUsize::new(0)),
            fail_acquire: false,
        }
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn acquire(&self) -> Result<Box<dyn ScrapeSession>, BrowserError> {
        if self.fail_acquire {
            return Err(BrowserError::LaunchFailed("driver unavailable".to_string()));
        }
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
            released: self.released.clone(),
        }))
    }
}
