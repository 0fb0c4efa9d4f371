//! Browser session traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::BrowserResult;

/// Link found on the current page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub text: String,
}

/// One open browser page, exclusively owned by its user.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the network to settle.
    async fn goto(&mut self, url: &str) -> BrowserResult<()>;

    /// URL of the current page.
    async fn current_url(&mut self) -> BrowserResult<String>;

    /// Whether `selector` matches at least one element.
    async fn exists(&mut self, selector: &str) -> BrowserResult<bool>;

    async fn click(&mut self, selector: &str) -> BrowserResult<()>;

    async fn focus(&mut self, selector: &str) -> BrowserResult<()>;

    /// Replace the field's content by typing `text` key by key.
    async fn type_text(&mut self, selector: &str, text: &str, delay_ms: u32) -> BrowserResult<()>;

    /// Set the field's value directly, without key events.
    async fn set_value(&mut self, selector: &str, value: &str) -> BrowserResult<()>;

    /// All links on the page.
    async fn anchors(&mut self) -> BrowserResult<Vec<Anchor>>;

    /// Dispatch a `submit` event on the form enclosing `selector`.
    /// Returns whether a form was found.
    async fn dispatch_submit(&mut self, selector: &str) -> BrowserResult<bool>;

    /// Wait for a pending navigation to finish.
    async fn wait_for_navigation(&mut self, timeout: Duration) -> BrowserResult<()>;

    /// Close the page and release the browser.
    async fn close(&mut self) -> BrowserResult<()>;
}

/// Opens browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserSession>>;
}
