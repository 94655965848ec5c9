use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AutomationError;
use crate::selector::Selector;

/// An open page (tab) in the automation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
}

/// A link-shaped element surfaced by a catalog scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub href: Option<String>,
    pub text: String,
}

/// The full capability set the core depends on, and nothing more.
///
/// One production implementation drives a Chromium instance over the
/// DevTools protocol; tests substitute an in-memory fake. Components hold
/// `Arc<dyn BrowserEngine>` and never reach past this seam.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    async fn current_url(&self) -> Result<String, AutomationError>;

    async fn title(&self) -> Result<String, AutomationError>;

    /// Full serialized markup of the current page.
    async fn content(&self) -> Result<String, AutomationError>;

    async fn open_pages(&self) -> Result<Vec<PageInfo>, AutomationError>;

    /// Title of one open page. Kept separate from `open_pages` so callers
    /// can bound this read on its own.
    async fn page_title(&self, page_id: &str) -> Result<String, AutomationError>;

    /// Number of live elements currently matching the selector.
    async fn count(&self, selector: &Selector) -> Result<usize, AutomationError>;

    /// Click the first live element matching the selector.
    async fn click(&self, selector: &Selector) -> Result<(), AutomationError>;

    /// Fill the first live element matching the selector.
    async fn fill(&self, selector: &Selector, text: &str) -> Result<(), AutomationError>;

    /// Visible text of the first live element matching the selector.
    async fn text_of(&self, selector: &Selector) -> Result<String, AutomationError>;

    /// href/text pairs for every element the selector matches.
    async fn collect_links(&self, selector: &Selector) -> Result<Vec<LinkInfo>, AutomationError>;

    /// Bounded wait for the page to reach a settled state after navigation.
    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), AutomationError>;

    /// Release the underlying browser. Must be idempotent.
    async fn close(&self) -> Result<(), AutomationError>;
}
