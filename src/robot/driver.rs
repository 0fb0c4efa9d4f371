//! One robot run: open the profile, find the post form, submit every post.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{RobotError, RobotResult};
use super::events::{EventHub, ProgressEvent};
use crate::browser::{BrowserError, BrowserLauncher, BrowserSession};
use crate::config::{PostSpec, RobotConfig};

/// Interval between selector checks while waiting for the post form.
const FORM_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Launching,
    Navigating,
    LocatingPostForm,
    Posting { index: usize, total: usize },
    Completed { submitted: usize, failed: usize },
    Stopped,
    Aborted { reason: String },
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Idle
                | RunPhase::Completed { .. }
                | RunPhase::Stopped
                | RunPhase::Aborted { .. }
        )
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed { submitted: usize, failed: usize },
    Stopped,
    Aborted(RobotError),
}

/// Why the step sequence ended early.
enum Interrupt {
    Stopped,
    Failed(RobotError),
}

impl From<RobotError> for Interrupt {
    fn from(err: RobotError) -> Self {
        Interrupt::Failed(err)
    }
}

impl From<BrowserError> for Interrupt {
    fn from(err: BrowserError) -> Self {
        Interrupt::Failed(err.into())
    }
}

type StepResult<T> = Result<T, Interrupt>;

/// Located post form.
#[derive(Debug, Clone)]
struct PostForm {
    url: String,
    textarea: String,
    submit: String,
}

/// Drives a single run against one browser session.
pub struct RunDriver {
    config: Arc<RobotConfig>,
    events: EventHub,
    phase: Arc<watch::Sender<RunPhase>>,
    cancel: CancellationToken,
}

impl RunDriver {
    pub fn new(
        config: Arc<RobotConfig>,
        events: EventHub,
        phase: Arc<watch::Sender<RunPhase>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            events,
            phase,
            cancel,
        }
    }

    /// Run to completion. The session is closed whatever the outcome.
    pub async fn run(self, launcher: &dyn BrowserLauncher) -> RunOutcome {
        self.set_phase(RunPhase::Launching);
        self.events.emit(ProgressEvent::info("Launching browser..."));

        let mut session = match launcher.launch().await {
            Ok(session) => session,
            Err(err) => return self.finish(RunOutcome::Aborted(err.into())),
        };
        self.events.emit(ProgressEvent::info("Browser launched"));

        let outcome = match self.drive(session.as_mut()).await {
            Ok((submitted, failed)) => RunOutcome::Completed { submitted, failed },
            Err(Interrupt::Stopped) => RunOutcome::Stopped,
            Err(Interrupt::Failed(err)) => RunOutcome::Aborted(err),
        };

        if let Err(err) = session.close().await {
            warn!("Failed to close browser session: {}", err);
        }
        self.events.emit(ProgressEvent::info("Browser closed"));
        self.finish(outcome)
    }

    fn finish(&self, outcome: RunOutcome) -> RunOutcome {
        match outcome {
            RunOutcome::Completed { submitted, failed } => {
                self.events.emit(ProgressEvent::success(format!(
                    "Run finished: {submitted} posted, {failed} failed"
                )));
                self.set_phase(RunPhase::Completed { submitted, failed });
            }
            RunOutcome::Stopped => {
                self.events.emit(ProgressEvent::info("Run stopped"));
                self.set_phase(RunPhase::Stopped);
            }
            RunOutcome::Aborted(ref err) => {
                self.events
                    .emit(ProgressEvent::error(format!("Run aborted: {err}")));
                self.set_phase(RunPhase::Aborted {
                    reason: err.to_string(),
                });
            }
        }
        outcome
    }

    fn set_phase(&self, phase: RunPhase) {
        debug!(?phase, "Run phase changed");
        self.phase.send_replace(phase);
    }

    fn checkpoint(&self) -> StepResult<()> {
        if self.cancel.is_cancelled() {
            Err(Interrupt::Stopped)
        } else {
            Ok(())
        }
    }

    /// Sleep, waking early on cancellation.
    async fn pause(&self, ms: u64) -> StepResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupt::Stopped),
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
        }
    }

    fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.config.page_timeout_ms)
    }

    async fn drive(&self, session: &mut dyn BrowserSession) -> StepResult<(usize, usize)> {
        let delays = &self.config.delays;

        self.set_phase(RunPhase::Navigating);
        let direct = parse_url(&self.config.direct_link)?;
        self.events
            .emit(ProgressEvent::info("Opening direct link...").with_url(direct.as_str()));
        session.goto(direct.as_str()).await?;
        self.pause(delays.initial_load_ms).await?;

        // Landing on the index page means the direct link logged us in.
        let current = session.current_url().await?;
        self.events
            .emit(ProgressEvent::info(format!("Current URL: {current}")));
        let mut page = Url::parse(&current).unwrap_or(direct);
        if is_index_page(&page) {
            self.events
                .emit(ProgressEvent::success("Redirect to index detected"));
        } else {
            if first_match(session, &self.config.selectors.profile)
                .await?
                .is_none()
            {
                return Err(RobotError::ProfileNotDetected.into());
            }
            self.events
                .emit(ProgressEvent::info("Profile detected, continuing"));

            // Only the path changes; the query carries the login.
            page.set_path("/index.html");
            session.goto(page.as_str()).await?;
            self.events
                .emit(ProgressEvent::info("Redirected to home page").with_url(page.as_str()));
            self.pause(delays.after_redirect_ms).await?;
        }
        self.checkpoint()?;

        self.set_phase(RunPhase::LocatingPostForm);
        self.open_post_form(session, &page).await?;
        let form = self.wait_for_form(session).await?;
        self.events
            .emit(ProgressEvent::success("Post form found").with_url(form.url.as_str()));

        let total = self.config.posts.len();
        let (mut submitted, mut failed) = (0, 0);
        for (i, post) in self.config.posts.iter().enumerate() {
            self.checkpoint()?;
            let index = i + 1;
            self.set_phase(RunPhase::Posting { index, total });
            self.events
                .emit(ProgressEvent::info(format!("Posting {index}/{total}...")));

            match self.submit_post(session, post, &form, i > 0).await {
                Ok(()) => {
                    submitted += 1;
                    self.events
                        .emit(ProgressEvent::success(format!("Post {index}/{total} submitted")));
                }
                Err(Interrupt::Stopped) => return Err(Interrupt::Stopped),
                Err(Interrupt::Failed(err)) => {
                    failed += 1;
                    self.events
                        .emit(ProgressEvent::error(format!("Post {index}/{total} failed: {err}")));
                }
            }

            if index < total {
                self.pause(delays.between_posts_ms).await?;
            }
        }
        Ok((submitted, failed))
    }

    /// Click the create-post link, falling back to scanning page anchors.
    async fn open_post_form(&self, session: &mut dyn BrowserSession, home: &Url) -> StepResult<()> {
        if let Some(selector) = first_match(session, &self.config.selectors.create_post).await? {
            debug!(selector, "Clicking create-post link");
            session.click(&selector).await?;
            if let Err(err) = session.wait_for_navigation(self.page_timeout()).await {
                debug!("No navigation after create-post click: {}", err);
            }
        } else {
            let anchors = session.anchors().await?;
            let target = anchors
                .iter()
                .find(|a| is_create_post_link(&a.text, &a.href))
                .and_then(|a| home.join(&a.href).ok())
                .ok_or(RobotError::CreateButtonNotFound)?;
            debug!(url = %target, "Following create-post anchor");
            session.goto(target.as_str()).await?;
        }

        let url = session.current_url().await?;
        self.events
            .emit(ProgressEvent::info("Opening post form...").with_url(url));
        Ok(())
    }

    /// Poll for the form fields until the selector timeout runs out.
    async fn wait_for_form(&self, session: &mut dyn BrowserSession) -> StepResult<PostForm> {
        let selectors = &self.config.selectors;
        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(self.config.delays.wait_for_selector_ms);
        loop {
            let textarea = first_match(session, &selectors.textarea).await?;
            let submit = first_match(session, &selectors.submit).await?;
            match (textarea, submit) {
                (Some(textarea), Some(submit)) => {
                    let url = session.current_url().await?;
                    return Ok(PostForm {
                        url,
                        textarea,
                        submit,
                    });
                }
                (textarea, submit) if tokio::time::Instant::now() >= deadline => {
                    return Err(RobotError::FormNotFound {
                        textarea: textarea.is_some(),
                        submit: submit.is_some(),
                    }
                    .into());
                }
                _ => {
                    let remaining =
                        deadline.saturating_duration_since(tokio::time::Instant::now());
                    self.pause(FORM_POLL_INTERVAL.min(remaining).as_millis() as u64)
                        .await?;
                }
            }
        }
    }

    async fn submit_post(
        &self,
        session: &mut dyn BrowserSession,
        post: &PostSpec,
        initial: &PostForm,
        reload: bool,
    ) -> StepResult<()> {
        let reloaded;
        let form = if reload {
            session.goto(&initial.url).await?;
            reloaded = self.wait_for_form(session).await?;
            &reloaded
        } else {
            initial
        };

        session.focus(&form.textarea).await?;
        session
            .type_text(&form.textarea, &post.text, self.config.delays.typing_delay_ms)
            .await?;

        if let Some(image) = post.image_url() {
            match first_match(session, &self.config.selectors.image).await? {
                Some(selector) => session.set_value(&selector, image).await?,
                None => self
                    .events
                    .emit(ProgressEvent::info("Image field not found, posting text only")),
            }
        }

        if let Err(err) = session.click(&form.submit).await {
            warn!("Submit click failed, dispatching submit event: {}", err);
            if !session.dispatch_submit(&form.textarea).await? {
                return Err(RobotError::SubmitFailed(err.to_string()).into());
            }
        }
        if let Err(err) = session.wait_for_navigation(self.page_timeout()).await {
            debug!("No navigation after submit: {}", err);
        }
        Ok(())
    }
}

fn parse_url(raw: &str) -> RobotResult<Url> {
    let invalid = |message: String| RobotError::InvalidUrl {
        url: raw.to_string(),
        message,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}

/// First selector that matches an element on the page.
async fn first_match(
    session: &mut dyn BrowserSession,
    selectors: &[String],
) -> RobotResult<Option<String>> {
    for selector in selectors {
        if session.exists(selector).await? {
            return Ok(Some(selector.clone()));
        }
    }
    Ok(None)
}

fn is_index_page(url: &Url) -> bool {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    last.eq_ignore_ascii_case("index") || last.eq_ignore_ascii_case("index.html")
}

fn is_create_post_link(text: &str, href: &str) -> bool {
    let text = text.to_lowercase();
    let href = href.to_lowercase();
    if href.is_empty() {
        return false;
    }
    text.contains("cré") || text.contains("create") || text.contains("post") || href.contains("creat")
}
