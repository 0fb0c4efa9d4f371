//! Test utilities and common setup.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use botdesk::api::{self, ChatState, RobotState};
use botdesk::browser::{Anchor, BrowserLauncher, BrowserResult, BrowserSession};
use botdesk::chat::ChatService;
use botdesk::config::{DelaysConfig, PostSpec, RobotConfig};
use botdesk::history::{Entry, FileHistoryStore};
use botdesk::robot::{EventHub, RunRegistry};
use botdesk::upstream::{ChatCompletion, UpstreamError, UpstreamResult};

/// Upstream returning a fixed reply, or failing when none is set.
pub struct FakeUpstream {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl FakeUpstream {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatCompletion for FakeUpstream {
    async fn complete(&self, _messages: &[Entry]) -> UpstreamResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(ref reply) => Ok(reply.clone()),
            None => Err(UpstreamError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
        }
    }
}

/// Chat relay backed by file storage in `dir`.
pub fn chat_app(dir: &Path, upstream: Arc<FakeUpstream>) -> Router {
    let store = Arc::new(FileHistoryStore::new(dir));
    let service = ChatService::new(store, upstream, "You are a test persona.", "tester");
    api::chat_router(ChatState::new(service, Vec::new()))
}

pub fn robot_config() -> RobotConfig {
    RobotConfig {
        direct_link: "https://site.test/?u=me&p=1".to_string(),
        posts: vec![PostSpec::text("hello")],
        delays: DelaysConfig {
            // Parks every run in its first pause until stopped.
            initial_load_ms: 60_000,
            after_redirect_ms: 0,
            between_posts_ms: 0,
            wait_for_selector_ms: 0,
            typing_delay_ms: 0,
        },
        ..RobotConfig::default()
    }
}

/// Launcher whose pages accept every command.
#[derive(Default)]
pub struct CountingLauncher {
    launches: AtomicUsize,
}

impl CountingLauncher {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for CountingLauncher {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(AcceptingSession))
    }
}

struct AcceptingSession;

#[async_trait]
impl BrowserSession for AcceptingSession {
    async fn goto(&mut self, _url: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        Ok("https://site.test/index.html".to_string())
    }

    async fn exists(&mut self, _selector: &str) -> BrowserResult<bool> {
        Ok(true)
    }

    async fn click(&mut self, _selector: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn focus(&mut self, _selector: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn type_text(&mut self, _selector: &str, _text: &str, _delay_ms: u32) -> BrowserResult<()> {
        Ok(())
    }

    async fn set_value(&mut self, _selector: &str, _value: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn anchors(&mut self) -> BrowserResult<Vec<Anchor>> {
        Ok(Vec::new())
    }

    async fn dispatch_submit(&mut self, _selector: &str) -> BrowserResult<bool> {
        Ok(true)
    }

    async fn wait_for_navigation(&mut self, _timeout: Duration) -> BrowserResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> BrowserResult<()> {
        Ok(())
    }
}

/// Robot control server with a counting fake browser.
pub fn robot_app(config: RobotConfig) -> (Router, Arc<RunRegistry>, Arc<CountingLauncher>) {
    let launcher = Arc::new(CountingLauncher::default());
    let registry = Arc::new(RunRegistry::new(config, launcher.clone(), EventHub::new()));
    let app = api::robot_router(RobotState::new(registry.clone()));
    (app, registry, launcher)
}
