//! Scripted browser used by the robot unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::browser::{
    Anchor, BrowserError, BrowserLauncher, BrowserResult, BrowserSession,
};
use crate::config::{DelaysConfig, PostSpec, RobotConfig};

/// Robot config with no pauses and three posts, the second with an image.
pub fn test_config() -> RobotConfig {
    RobotConfig {
        direct_link: "https://site.test/login?token=abc".to_string(),
        posts: vec![
            PostSpec::text("first"),
            PostSpec {
                text: "second".to_string(),
                image: Some("https://img.test/a.png".to_string()),
            },
            PostSpec::text("third"),
        ],
        delays: DelaysConfig {
            initial_load_ms: 0,
            after_redirect_ms: 0,
            between_posts_ms: 0,
            wait_for_selector_ms: 0,
            typing_delay_ms: 0,
        },
        page_timeout_ms: 1000,
        ..RobotConfig::default()
    }
}

/// What the fake site looks like.
#[derive(Debug, Clone)]
pub struct FakePage {
    /// URL reported after the first navigation.
    pub landing: String,
    /// Selectors that match an element.
    pub selectors: Vec<String>,
    pub anchors: Vec<Anchor>,
    /// Selectors whose click fails.
    pub failing_clicks: Vec<String>,
    pub submit_event_works: bool,
    /// Cancelled the first time this selector is clicked.
    pub cancel_on_click: Option<(String, CancellationToken)>,
}

impl FakePage {
    /// A logged-in site where every default selector resolves.
    pub fn ready() -> Self {
        Self {
            landing: "https://site.test/index.html".to_string(),
            selectors: vec![
                ".username".to_string(),
                r#"a[href*="page-creat-post"]"#.to_string(),
                r#"textarea[name="text"]"#.to_string(),
                r#"button[name="blog_submit"]"#.to_string(),
                r#"input[name="var-img"]"#.to_string(),
            ],
            anchors: Vec::new(),
            failing_clicks: Vec::new(),
            submit_event_works: true,
            cancel_on_click: None,
        }
    }
}

pub struct FakeLauncher {
    page: FakePage,
    fail: bool,
    launches: Arc<AtomicUsize>,
    actions: Arc<Mutex<Vec<String>>>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            fail: false,
            launches: Arc::new(AtomicUsize::new(0)),
            actions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(FakePage::ready())
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BrowserError::Launch("no browser".to_string()));
        }
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
            url: "about:blank".to_string(),
            landed: false,
            actions: self.actions.clone(),
        }))
    }
}

struct FakeSession {
    page: FakePage,
    url: String,
    landed: bool,
    actions: Arc<Mutex<Vec<String>>>,
}

impl FakeSession {
    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        self.record(format!("goto {url}"));
        self.url = if self.landed {
            url.to_string()
        } else {
            self.page.landing.clone()
        };
        self.landed = true;
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        Ok(self.url.clone())
    }

    async fn exists(&mut self, selector: &str) -> BrowserResult<bool> {
        Ok(self.page.selectors.iter().any(|s| s == selector))
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<()> {
        self.record(format!("click {selector}"));
        if let Some((_, cancel)) = self
            .page
            .cancel_on_click
            .as_ref()
            .filter(|(target, _)| target == selector)
        {
            cancel.cancel();
        }
        if self.page.failing_clicks.iter().any(|s| s == selector) {
            return Err(BrowserError::Command {
                action: "click".to_string(),
                message: "element is not clickable".to_string(),
            });
        }
        Ok(())
    }

    async fn focus(&mut self, selector: &str) -> BrowserResult<()> {
        self.record(format!("focus {selector}"));
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str, _delay_ms: u32) -> BrowserResult<()> {
        self.record(format!("type {selector} {text}"));
        Ok(())
    }

    async fn set_value(&mut self, selector: &str, value: &str) -> BrowserResult<()> {
        self.record(format!("set_value {selector} {value}"));
        Ok(())
    }

    async fn anchors(&mut self) -> BrowserResult<Vec<Anchor>> {
        Ok(self.page.anchors.clone())
    }

    async fn dispatch_submit(&mut self, selector: &str) -> BrowserResult<bool> {
        self.record(format!("dispatch_submit {selector}"));
        Ok(self.page.submit_event_works)
    }

    async fn wait_for_navigation(&mut self, _timeout: Duration) -> BrowserResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> BrowserResult<()> {
        self.record("close".to_string());
        Ok(())
    }
}
