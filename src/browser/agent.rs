//! agent-browser daemon integration.
//!
//! The daemon is started through its CLI (`<binary> --session <name> open
//! about:blank`), then driven directly over its session socket: one JSON
//! command per line, one JSON response per line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use uuid::Uuid;

use super::{Anchor, BrowserError, BrowserLauncher, BrowserResult, BrowserSession};
use crate::config::{APP_NAME, BrowserConfig};

/// Launches agent-browser daemons.
#[derive(Debug, Clone)]
pub struct AgentBrowserLauncher {
    config: BrowserConfig,
    /// Timeout applied to every command of a launched session.
    page_timeout: Duration,
}

impl AgentBrowserLauncher {
    pub fn new(config: BrowserConfig, page_timeout: Duration) -> Self {
        Self {
            config,
            page_timeout,
        }
    }

    fn socket_dir(&self) -> PathBuf {
        match self.config.socket_dir {
            Some(ref dir) => PathBuf::from(dir),
            None => agent_browser_base_dir().join(&self.config.session),
        }
    }

    fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.config.launch_timeout_secs.max(1))
    }

    /// Run one CLI command against the session.
    async fn run_cli(&self, args: &[&str]) -> BrowserResult<()> {
        let socket_dir = self.socket_dir();
        if let Err(err) = std::fs::create_dir_all(&socket_dir) {
            warn!(
                "Failed to create agent-browser socket dir {}: {}",
                socket_dir.display(),
                err
            );
        }

        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("--session").arg(&self.config.session);
        if self.config.headed {
            cmd.arg("--headed");
        }
        if let Some(ref executable_path) = self.config.executable_path {
            cmd.arg("--executable-path").arg(executable_path);
        }
        cmd.env("AGENT_BROWSER_SOCKET_DIR", &socket_dir);
        cmd.args(args);

        debug!(
            "agent-browser command: {} {:?} (session={})",
            self.config.binary, args, self.config.session
        );

        let output = timeout(self.launch_timeout(), cmd.output())
            .await
            .map_err(|_| BrowserError::Timeout("agent-browser launch".to_string()))?
            .map_err(|e| BrowserError::Launch(format!("running {}: {}", self.config.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let detail = if !stderr.is_empty() { stderr } else { stdout };
            return Err(BrowserError::Launch(detail));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserLauncher for AgentBrowserLauncher {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        self.run_cli(&["open", "about:blank"]).await?;
        let socket = self
            .socket_dir()
            .join(format!("{}.sock", self.config.session));
        Ok(Box::new(AgentBrowserSession::new(socket, self.page_timeout)))
    }
}

/// Resolve the base directory for agent-browser session socket directories.
///
/// Priority:
///   AGENT_BROWSER_SOCKET_DIR_BASE > XDG_STATE_HOME/botdesk/agent-browser >
///   ~/.local/state/botdesk/agent-browser > tmpdir/botdesk/agent-browser
pub fn agent_browser_base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENT_BROWSER_SOCKET_DIR_BASE") {
        return PathBuf::from(dir);
    }
    if let Ok(state_dir) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(state_dir)
            .join(APP_NAME)
            .join("agent-browser");
    }
    if let Some(home) = dirs::home_dir() {
        return home
            .join(".local")
            .join("state")
            .join(APP_NAME)
            .join("agent-browser");
    }
    std::env::temp_dir().join(APP_NAME).join("agent-browser")
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    #[serde(default)]
    id: String,
    success: bool,
    data: Option<Value>,
    error: Option<String>,
}

/// Session talking to a running agent-browser daemon.
#[derive(Debug)]
pub struct AgentBrowserSession {
    socket: PathBuf,
    timeout: Duration,
}

impl AgentBrowserSession {
    pub fn new(socket: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket: socket.into(),
            timeout,
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Send one action and return its `data` payload.
    async fn send(&self, action: &str, data: Value) -> BrowserResult<Option<Value>> {
        let mut command = match data {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(BrowserError::Protocol(format!(
                    "payload for {action} must be an object, got {other}"
                )));
            }
        };
        let id = Uuid::new_v4().to_string();
        command.insert("id".to_string(), Value::String(id.clone()));
        command.insert("action".to_string(), Value::String(action.to_string()));

        let mut line = Value::Object(command).to_string();
        line.push('\n');

        let raw = timeout(self.timeout, self.round_trip(&line))
            .await
            .map_err(|_| BrowserError::Timeout(action.to_string()))??;

        if raw.trim().is_empty() {
            return Err(BrowserError::Protocol("empty response from daemon".into()));
        }
        let response: ResponsePayload = serde_json::from_str(&raw)
            .map_err(|e| BrowserError::Protocol(format!("failed to parse daemon response: {e}")))?;
        if !response.id.is_empty() && response.id != id {
            debug!("agent-browser response id {} != request id {}", response.id, id);
        }

        if !response.success {
            return Err(BrowserError::Command {
                action: action.to_string(),
                message: response.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(response.data)
    }

    #[cfg(unix)]
    async fn round_trip(&self, line: &str) -> BrowserResult<String> {
        let stream = tokio::net::UnixStream::connect(&self.socket)
            .await
            .map_err(|source| BrowserError::Connect {
                path: self.socket.display().to_string(),
                source,
            })?;
        exchange(stream, line).await
    }

    #[cfg(not(unix))]
    async fn round_trip(&self, line: &str) -> BrowserResult<String> {
        let port_file = self.socket.with_extension("port");
        let port = std::fs::read_to_string(&port_file)
            .ok()
            .and_then(|raw| raw.trim().parse::<u16>().ok())
            .ok_or_else(|| {
                BrowserError::Protocol(format!("no daemon port in {}", port_file.display()))
            })?;
        let addr = format!("127.0.0.1:{port}");
        let stream = tokio::net::TcpStream::connect(&addr)
            .await
            .map_err(|source| BrowserError::Connect { path: addr, source })?;
        exchange(stream, line).await
    }

    async fn evaluate(&self, script: String) -> BrowserResult<Value> {
        let data = self.send("evaluate", json!({ "script": script })).await?;
        Ok(match data {
            Some(Value::Object(mut map)) if map.contains_key("result") => {
                map.remove("result").unwrap_or(Value::Null)
            }
            Some(other) => other,
            None => Value::Null,
        })
    }
}

async fn exchange<S>(stream: S, line: &str) -> BrowserResult<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;

    let mut reader = BufReader::new(reader);
    let mut response = String::new();
    reader.read_line(&mut response).await?;
    Ok(response)
}

/// Quote a string as a JavaScript string literal.
fn js_str(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

#[async_trait]
impl BrowserSession for AgentBrowserSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        self.send("navigate", json!({ "url": url, "waitUntil": "networkidle" }))
            .await?;
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        match self.send("url", json!({})).await? {
            Some(Value::String(url)) => Ok(url),
            Some(Value::Object(map)) => map
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| BrowserError::Protocol("url response without url".into())),
            other => Err(BrowserError::Protocol(format!(
                "unexpected url response: {other:?}"
            ))),
        }
    }

    async fn exists(&mut self, selector: &str) -> BrowserResult<bool> {
        let script = format!("document.querySelector({}) !== null", js_str(selector));
        Ok(self.evaluate(script).await?.as_bool().unwrap_or(false))
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<()> {
        self.send("click", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn focus(&mut self, selector: &str) -> BrowserResult<()> {
        self.send("focus", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str, delay_ms: u32) -> BrowserResult<()> {
        self.send(
            "type",
            json!({ "selector": selector, "text": text, "delay": delay_ms, "clear": true }),
        )
        .await?;
        Ok(())
    }

    async fn set_value(&mut self, selector: &str, value: &str) -> BrowserResult<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (el) el.value = {}; return !!el; }})()",
            js_str(selector),
            js_str(value)
        );
        self.evaluate(script).await?;
        Ok(())
    }

    async fn anchors(&mut self) -> BrowserResult<Vec<Anchor>> {
        let script = "Array.from(document.querySelectorAll('a')).map(a => ({ \
                      href: a.getAttribute('href') || '', text: a.innerText || '' }))";
        let value = self.evaluate(script.to_string()).await?;
        serde_json::from_value(value)
            .map_err(|e| BrowserError::Protocol(format!("unexpected anchor list: {e}")))
    }

    async fn dispatch_submit(&mut self, selector: &str) -> BrowserResult<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; \
             const form = el.closest('form'); if (!form) return false; \
             form.dispatchEvent(new Event('submit', {{ bubbles: true, cancelable: true }})); \
             return true; }})()",
            js_str(selector)
        );
        Ok(self.evaluate(script).await?.as_bool().unwrap_or(false))
    }

    async fn wait_for_navigation(&mut self, timeout: Duration) -> BrowserResult<()> {
        self.send(
            "waitforloadstate",
            json!({ "state": "networkidle", "timeout": timeout.as_millis() as u64 }),
        )
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> BrowserResult<()> {
        self.send("close", json!({})).await?;
        Ok(())
    }
}
