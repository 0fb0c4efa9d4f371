//! Application configuration.
//!
//! Configuration is layered: built-in defaults, then the TOML file, then
//! `BOTDESK__SECTION__KEY` environment variables.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use log::info;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "botdesk";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub chat: ChatConfig,
    pub robot: RobotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: Option<String>,
    pub state_dir: Option<String>,
}

/// Chat relay server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Origins allowed for CORS (empty allows any origin)
    pub allowed_origins: Vec<String>,
    /// Directory holding `memory_<id>.json` files (default: `<data_dir>/history`)
    pub history_dir: Option<String>,
    /// Author string returned with every reply
    pub author: String,
    /// System persona sent ahead of every conversation
    pub persona: String,
    pub upstream: UpstreamConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            allowed_origins: Vec::new(),
            history_dir: None,
            author: APP_NAME.to_string(),
            persona: "Your name is Botdesk, a friendly assistant. You mainly speak English \
                      but can also respond in Tagalog or Bisaya."
                .to_string(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// Hosted chat completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Completion endpoint URL.
    pub base_url: String,
    /// Bearer token sent in the Authorization header.
    pub api_key: Option<String>,
    pub project_name: String,
    pub temperature: f64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    pub origin: Option<String>,
    pub referer: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepenglish.com/api/gpt_open_ai/chatnew".to_string(),
            api_key: None,
            project_name: "wordpress".to_string(),
            temperature: 0.9,
            timeout_secs: 60,
            user_agent: None,
            origin: None,
            referer: None,
        }
    }
}

/// Posting robot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Origins allowed for CORS (empty allows any origin)
    pub allowed_origins: Vec<String>,
    /// Profile link that logs the browser into the site.
    pub direct_link: String,
    /// Timeout for a single page operation.
    pub page_timeout_ms: u64,
    /// Posts submitted in order on every run.
    pub posts: Vec<PostSpec>,
    pub delays: DelaysConfig,
    pub selectors: SelectorsConfig,
    pub browser: BrowserConfig,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
            direct_link: String::new(),
            posts: vec![
                PostSpec::text("Automatic post #1"),
                PostSpec {
                    text: "Automatic post #2 with an image".to_string(),
                    image: Some("https://via.placeholder.com/400".to_string()),
                },
                PostSpec::text("Automatic post #3"),
            ],
            delays: DelaysConfig::default(),
            page_timeout_ms: 20_000,
            selectors: SelectorsConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

/// One post to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSpec {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl PostSpec {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    /// Image URL, if one is set and non-blank.
    pub fn image_url(&self) -> Option<&str> {
        self.image.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Pauses between robot steps, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelaysConfig {
    pub initial_load_ms: u64,
    pub after_redirect_ms: u64,
    pub between_posts_ms: u64,
    pub wait_for_selector_ms: u64,
    /// Per-keystroke delay when typing post text.
    pub typing_delay_ms: u32,
}

impl Default for DelaysConfig {
    fn default() -> Self {
        Self {
            initial_load_ms: 3000,
            after_redirect_ms: 1500,
            between_posts_ms: 3000,
            wait_for_selector_ms: 8000,
            typing_delay_ms: 40,
        }
    }
}

/// CSS selector candidates, tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorsConfig {
    /// Elements that prove the profile is logged in.
    pub profile: Vec<String>,
    /// Links or buttons opening the post form.
    pub create_post: Vec<String>,
    pub textarea: Vec<String>,
    pub image: Vec<String>,
    pub submit: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            profile: strings(&[".user-header", ".username", "#profile-identifier"]),
            create_post: strings(&[
                r#"a[href="/page-creat-post.html"]"#,
                r#"a[href*="page-creat-post"]"#,
                r#"a[href*="page-bot-post"]"#,
                r#"a[href="/page-bot-post.html"]"#,
                "a.create-post",
                "button.create-post",
                "a#new-post",
                "button#new-post",
            ]),
            textarea: strings(&[
                r#"textarea[name="text"]"#,
                "textarea#text",
                "textarea",
                "textarea[placeholder]",
            ]),
            image: strings(&[
                r#"input[name="var-img"]"#,
                r#"input[name="image"]"#,
                r#"input[type="text"]"#,
            ]),
            submit: strings(&[
                r#"button[name="blog_submit"]"#,
                r#"button[type="submit"]"#,
                r#"input[type="submit"]"#,
                "button.post, button.publish",
            ]),
        }
    }
}

/// agent-browser daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to the agent-browser CLI binary.
    pub binary: String,
    /// Daemon session name.
    pub session: String,
    /// Launch browser in headed mode (default: headless).
    pub headed: bool,
    /// Optional Chromium executable path.
    pub executable_path: Option<String>,
    /// Override for the daemon socket directory.
    pub socket_dir: Option<String>,
    /// Timeout for launching the daemon, in seconds.
    pub launch_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            binary: "agent-browser".to_string(),
            session: APP_NAME.to_string(),
            headed: false,
            executable_path: None,
            socket_dir: None,
            launch_timeout_secs: 30,
        }
    }
}

/// Resolved filesystem locations.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl AppPaths {
    pub fn discover(override_path: Option<PathBuf>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join("config.toml"),
        };

        if config_file.parent().is_none() {
            return Err(anyhow!("invalid config file path: {config_file:?}"));
        }

        Ok(Self {
            config_file,
            data_dir: default_data_dir()?,
            state_dir: default_state_dir()?,
        })
    }

    pub fn apply_overrides(mut self, cfg: &AppConfig) -> Result<Self> {
        if let Some(ref data_override) = cfg.paths.data_dir {
            self.data_dir = expand_str_path(data_override)?;
        }
        if let Some(ref state_override) = cfg.paths.state_dir {
            self.state_dir = expand_str_path(state_override)?;
        }
        Ok(self)
    }

    /// Directory for chat history files.
    pub fn history_dir(&self, cfg: &ChatConfig) -> Result<PathBuf> {
        match cfg.history_dir {
            Some(ref dir) => expand_str_path(dir),
            None => Ok(self.data_dir.join("history")),
        }
    }
}

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config: {}, data: {}, state: {}",
            self.config_file.display(),
            self.data_dir.display(),
            self.state_dir.display()
        )
    }
}

/// Configuration loaded at startup.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// The default file was written by this load.
    pub created: bool,
}

/// Load the configuration, writing a default file first if none exists.
pub fn load_or_init_config(paths: &AppPaths, dry_run: bool) -> Result<LoadedConfig> {
    let mut created = false;
    if !paths.config_file.exists() {
        if dry_run {
            info!(
                "dry-run: would create default config at {}",
                paths.config_file.display()
            );
        } else {
            write_default_config(&paths.config_file)?;
            created = true;
        }
    }

    Ok(LoadedConfig {
        config: load_config(&paths.config_file)?,
        created,
    })
}

/// Load the configuration from a file (optional) and the environment.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let env_prefix = env_prefix();
    let built = Config::builder()
        .set_default("logging.level", "info")?
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
        .build()
        .with_context(|| format!("reading config from {}", path.display()))?;

    let mut config: AppConfig = built
        .try_deserialize()
        .context("deserializing configuration")?;

    if let Some(ref file) = config.logging.file {
        let expanded = expand_str_path(file)?;
        config.logging.file = Some(expanded.display().to_string());
    }

    Ok(config)
}

pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = default_config_header(path);
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> String {
    let mut buffer = String::new();
    buffer.push_str("# Configuration for ");
    buffer.push_str(APP_NAME);
    buffer.push('\n');
    buffer.push_str("# File: ");
    buffer.push_str(&path.display().to_string());
    buffer.push('\n');
    buffer.push_str("# Environment overrides: ");
    buffer.push_str(&env_prefix());
    buffer.push_str("__SECTION__KEY\n\n");
    buffer
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::data_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("share").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine data directory"))
}

fn default_state_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::state_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("state").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine state directory"))
}

fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_round_trips_through_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        write_default_config(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("# Configuration for botdesk"));

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.chat.port, 3001);
        assert_eq!(loaded.robot.port, 3000);
        assert_eq!(loaded.robot.posts.len(), 3);
        assert_eq!(loaded.robot.delays.between_posts_ms, 3000);
        assert_eq!(loaded.chat.upstream.project_name, "wordpress");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[chat]
port = 9000
author = "Someone"

[robot]
direct_link = "https://site.test/?u=me"

[[robot.posts]]
text = "only post"
"#,
        )
        .unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.chat.port, 9000);
        assert_eq!(loaded.chat.author, "Someone");
        assert_eq!(loaded.chat.upstream.temperature, 0.9);
        assert_eq!(loaded.robot.direct_link, "https://site.test/?u=me");
        assert_eq!(loaded.robot.posts, vec![PostSpec::text("only post")]);
        assert!(!loaded.robot.selectors.submit.is_empty());
    }

    #[test]
    fn test_load_or_init_reports_created_file() {
        let temp = TempDir::new().unwrap();
        let paths = AppPaths {
            config_file: temp.path().join("config.toml"),
            data_dir: temp.path().join("data"),
            state_dir: temp.path().join("state"),
        };

        let dry = load_or_init_config(&paths, true).unwrap();
        assert!(!dry.created);
        assert!(!paths.config_file.exists());

        let first = load_or_init_config(&paths, false).unwrap();
        assert!(first.created);
        assert!(paths.config_file.exists());
        assert_eq!(first.config.chat.port, 3001);

        let second = load_or_init_config(&paths, false).unwrap();
        assert!(!second.created);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let loaded = load_config(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.logging.level, "info");
        assert_eq!(loaded.robot.browser.binary, "agent-browser");
    }

    #[test]
    fn test_history_dir_defaults_under_data_dir() {
        let paths = AppPaths {
            config_file: PathBuf::from("/cfg/config.toml"),
            data_dir: PathBuf::from("/data/botdesk"),
            state_dir: PathBuf::from("/state/botdesk"),
        };
        let mut chat = ChatConfig::default();
        assert_eq!(
            paths.history_dir(&chat).unwrap(),
            PathBuf::from("/data/botdesk/history")
        );

        chat.history_dir = Some("/srv/memory".to_string());
        assert_eq!(paths.history_dir(&chat).unwrap(), PathBuf::from("/srv/memory"));
    }

    #[test]
    fn test_post_image_url_ignores_blank() {
        let post = PostSpec {
            text: "t".to_string(),
            image: Some(String::new()),
        };
        assert_eq!(post.image_url(), None);
        assert_eq!(PostSpec::text("t").image_url(), None);
    }
}
