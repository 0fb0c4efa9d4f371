use std::env;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::{LevelFilter, debug, error, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use botdesk::api::{ChatState, RobotState, chat_router, robot_router};
use botdesk::browser::AgentBrowserLauncher;
use botdesk::chat::ChatService;
use botdesk::config::{
    APP_NAME, AppConfig, AppPaths, load_or_init_config, write_default_config,
};
use botdesk::history::{FileHistoryStore, HistoryStore, validate_user_id};
use botdesk::robot::{EventHub, RunRegistry};
use botdesk::upstream::HttpChatClient;

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_serve(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    match cmd {
        ServeCommand::Chat(opts) => handle_serve_chat(&ctx, opts).await,
        ServeCommand::Robot(opts) => handle_serve_robot(&ctx, opts).await,
    }
}

#[tokio::main]
async fn async_history(ctx: RuntimeContext, cmd: HistoryCommand) -> Result<()> {
    handle_history(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    match cli.command {
        Command::Serve { target } => async_serve(ctx, target),
        Command::History { command } => async_history(ctx, command),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Botdesk - chat relay with memory and a browser posting robot.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<std::path::PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    /// Control color output (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
    /// Do not change anything on disk
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,
    /// Assume "yes" for interactive prompts
    #[arg(short = 'y', long = "yes", global = true)]
    assume_yes: bool,
    /// Emit additional diagnostics for troubleshooting
    #[arg(long = "diagnostics", global = true)]
    diagnostics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start one of the HTTP servers
    Serve {
        #[command(subcommand)]
        target: ServeCommand,
    },
    /// Inspect or clear a user's chat history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
    /// Create config directories and default files
    Init(InitCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum ServeCommand {
    /// Serve the chat relay (`GET /api/ai`)
    Chat(BindOpts),
    /// Serve the robot control page and endpoints
    Robot(RobotServeOpts),
}

#[derive(Debug, Clone, Args)]
struct BindOpts {
    /// Host address to bind to (overrides config)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
struct RobotServeOpts {
    #[command(flatten)]
    bind: BindOpts,
    /// Profile link to open (overrides config)
    #[arg(long, value_name = "URL")]
    direct_link: Option<String>,
    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    /// Print a user's stored conversation
    Show {
        /// User id
        id: String,
    },
    /// Delete a user's stored conversation
    Clear {
        /// User id
        id: String,
    },
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Regenerate the default configuration file
    Reset,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
    /// The config file did not exist before this process wrote it.
    config_created: bool,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.clone())?;
        let loaded = load_or_init_config(&paths, common.dry_run)?;
        let paths = paths.apply_overrides(&loaded.config)?;
        let ctx = Self {
            common,
            paths,
            config: loaded.config,
            config_created: loaded.created,
        };
        ctx.ensure_directories()?;
        Ok(ctx)
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let level = match self.effective_log_level() {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };

        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{APP_NAME}={level},tower_http={level}"))
        });

        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .ok();
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(!disable_color)
                        .with_target(self.common.diagnostics)
                        .with_file(self.common.diagnostics)
                        .with_line_number(self.common.diagnostics),
                )
                .try_init()
                .ok();
        }

        // env_logger serves the `log` users (storage, browser plumbing).
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        builder.filter_level(self.effective_log_level());
        builder.try_init().ok();

        Ok(())
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self
                    .config
                    .logging
                    .level
                    .parse()
                    .unwrap_or(LevelFilter::Info),
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn ensure_directories(&self) -> Result<()> {
        if self.common.dry_run {
            info!(
                "dry-run: would ensure data dir {} and state dir {}",
                self.paths.data_dir.display(),
                self.paths.state_dir.display()
            );
            return Ok(());
        }

        fs::create_dir_all(&self.paths.data_dir).with_context(|| {
            format!("creating data directory {}", self.paths.data_dir.display())
        })?;
        fs::create_dir_all(&self.paths.state_dir).with_context(|| {
            format!(
                "creating state directory {}",
                self.paths.state_dir.display()
            )
        })?;
        Ok(())
    }

    fn history_store(&self) -> Result<FileHistoryStore> {
        let dir = self.paths.history_dir(&self.config.chat)?;
        Ok(FileHistoryStore::new(dir))
    }
}

fn bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))
}

async fn handle_serve_chat(ctx: &RuntimeContext, opts: BindOpts) -> Result<()> {
    let chat = &ctx.config.chat;
    let host = opts.host.unwrap_or_else(|| chat.host.clone());
    let port = opts.port.unwrap_or(chat.port);
    let addr = bind_addr(&host, port)?;

    let store = ctx.history_store()?;
    info!("History directory: {}", store.dir().display());
    if chat.upstream.api_key.is_none() {
        log::warn!("No upstream API key configured (chat.upstream.api_key)");
    }
    let upstream =
        HttpChatClient::new(&chat.upstream).context("creating upstream chat client")?;
    info!("Upstream endpoint: {}", upstream.endpoint());

    let service = ChatService::new(
        Arc::new(store),
        Arc::new(upstream),
        chat.persona.clone(),
        chat.author.clone(),
    );
    let app = chat_router(ChatState::new(service, chat.allowed_origins.clone()));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("Chat relay listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping chat relay...");
        })
        .await
        .context("running server")?;

    Ok(())
}

async fn handle_serve_robot(ctx: &RuntimeContext, opts: RobotServeOpts) -> Result<()> {
    let mut robot = ctx.config.robot.clone();
    if let Some(link) = opts.direct_link {
        robot.direct_link = link;
    }
    if opts.headed {
        robot.browser.headed = true;
    }
    if robot.direct_link.trim().is_empty() {
        return Err(anyhow!(
            "robot.direct_link is not set (configure it in {} or pass --direct-link)",
            ctx.paths.config_file.display()
        ));
    }

    let host = opts.bind.host.unwrap_or_else(|| robot.host.clone());
    let port = opts.bind.port.unwrap_or(robot.port);
    let addr = bind_addr(&host, port)?;

    let launcher = AgentBrowserLauncher::new(
        robot.browser.clone(),
        Duration::from_millis(robot.page_timeout_ms),
    );
    let registry = Arc::new(RunRegistry::new(robot, Arc::new(launcher), EventHub::new()));
    let shutdown = CancellationToken::new();
    let app = robot_router(RobotState::new(registry.clone()).with_shutdown(shutdown.clone()));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("Robot control page on http://{}", addr);

    let run_registry = registry.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping active run...");
            shutdown.cancel();
            run_registry.shutdown().await;
        })
        .await
        .context("running server")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn handle_history(ctx: &RuntimeContext, command: HistoryCommand) -> Result<()> {
    let store = ctx.history_store()?;
    match command {
        HistoryCommand::Show { id } => {
            validate_user_id(&id)?;
            let entries = store.load(&id).await;
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&entries).context("serializing history")?
                );
            } else if entries.is_empty() {
                println!("No history for '{id}'");
            } else {
                for entry in &entries {
                    println!("{}: {}", entry.role.as_str(), entry.content);
                }
            }
            Ok(())
        }
        HistoryCommand::Clear { id } => {
            if ctx.common.dry_run {
                info!("dry-run: would clear history for '{}'", id);
                return Ok(());
            }
            store
                .clear(&id)
                .await
                .with_context(|| format!("clearing history for '{id}'"))?;
            println!("Chat history cleared for '{id}'");
            Ok(())
        }
    }
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.config_created {
        println!("Wrote default config to {}", ctx.paths.config_file.display());
        return Ok(());
    }

    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }

    if ctx.common.dry_run {
        info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }

    write_default_config(&ctx.paths.config_file)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ctx.config)
                        .context("serializing config to JSON")?
                );
            } else {
                println!(
                    "{}",
                    toml::to_string_pretty(&ctx.config).context("serializing config to TOML")?
                );
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}
