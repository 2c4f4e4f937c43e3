use std::env;
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use config::{Config, Environment, File, FileFormat};
use log::{LevelFilter, debug, info, warn};
use tokio::net::TcpListener;

use kinchat::api::{self, AppState};
use kinchat::client::{ChatSession, KinchatClient};
use kinchat::config::{AppConfig, ChatProviderKind};
use kinchat::files::FileGateway;
use kinchat::models::{ChatIntent, Conversation, Message, Role};
use kinchat::providers::{
    AnthropicProvider, ChatProvider, GeminiProvider, ImageProvider, http_client,
};
use kinchat::store::LocalConversationStore;

const APP_NAME: &str = "kinchat";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(ctx: RuntimeContext, cmd: Command) -> Result<()> {
    match cmd {
        Command::Serve(cmd) => handle_serve(&ctx, cmd).await,
        Command::Chat(cmd) => handle_chat(&ctx, cmd).await,
        Command::Image(cmd) => handle_image(&ctx, cmd).await,
        Command::Analyze(cmd) => handle_analyze(&ctx, cmd).await,
        Command::Upload(cmd) => handle_upload(&ctx, cmd).await,
        Command::Health(cmd) => handle_health(&ctx, cmd).await,
        Command::Conversations { command } => handle_conversations(&ctx, command).await,
        Command::Init(_) | Command::Config { .. } | Command::Completions { .. } => {
            Err(anyhow!("command does not need the async runtime"))
        }
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    match cli.command {
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
        command => async_main(ctx, command),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Kinchat - family chat assistant with image generation.",
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
    config: Option<PathBuf>,
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
    #[arg(long, global = true, conflicts_with = "yaml")]
    json: bool,
    /// Output machine readable YAML
    #[arg(long, global = true)]
    yaml: bool,
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
    #[arg(short = 'y', long = "yes", alias = "force", global = true)]
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
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Send a chat message and stream the reply
    Chat(ChatCommand),
    /// Generate an image from a prompt
    Image(ImageCommand),
    /// Describe a stored image
    Analyze(AnalyzeCommand),
    /// Upload an image as an attachment
    Upload(UploadCommand),
    /// Check that the server is reachable
    Health(HealthCommand),
    /// Inspect and manage saved conversations
    Conversations {
        #[command(subcommand)]
        command: ConversationsCommand,
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

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to (defaults to server.host)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (defaults to server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
struct SessionArgs {
    /// Password that unlocks the session
    #[arg(long, env = "KINCHAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Server URL (defaults to client.server_url)
    #[arg(long, value_name = "URL")]
    server: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct ChatCommand {
    /// Message to send
    message: String,
    /// Continue an existing conversation
    #[arg(short, long, value_name = "ID")]
    conversation: Option<String>,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Clone, Args)]
struct ImageCommand {
    /// What to draw
    prompt: String,
    /// Stored image to edit instead of drawing from scratch
    #[arg(long, value_name = "URL")]
    source: Option<String>,
    #[arg(short, long, value_name = "ID")]
    conversation: Option<String>,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Clone, Args)]
struct AnalyzeCommand {
    /// Gateway URL of the image, e.g. /api/file/uploads/2025/01/<id>.png
    image_url: String,
    /// Question about the image
    #[arg(long)]
    prompt: Option<String>,
    #[arg(short, long, value_name = "ID")]
    conversation: Option<String>,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Clone, Args)]
struct UploadCommand {
    /// Local image file
    path: PathBuf,
    /// Analyze the image after uploading
    #[arg(long)]
    analyze: bool,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Clone, Args)]
struct HealthCommand {
    /// Server URL (defaults to client.server_url)
    #[arg(long, value_name = "URL")]
    server: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ConversationsCommand {
    /// List saved conversations, most recent first
    List(SessionArgs),
    /// Print one conversation
    Show {
        id: String,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Delete a conversation
    Delete {
        id: String,
        #[command(flatten)]
        session: SessionArgs,
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
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.clone())?;
        let mut config = load_or_init_config(&paths, &common)?;
        config.apply_env_fallbacks();
        let ctx = Self {
            common,
            paths,
            config,
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
            EnvFilter::new(format!(
                "kinchat={level},kinchat_files={level},tower_http={level}"
            ))
        });

        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
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
                        .with_writer(io::stderr)
                        .with_ansi(!disable_color)
                        .with_target(self.common.diagnostics)
                        .with_file(self.common.diagnostics)
                        .with_line_number(self.common.diagnostics),
                )
                .try_init()
                .ok();
        }

        // log crate users (startup path) go through env_logger
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        builder.filter_level(self.effective_log_level());
        builder.try_init().ok();

        Ok(())
    }

    /// Explicit flags win; otherwise `logging.level` from the config.
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
                "dry-run: would ensure data dir {}",
                self.paths.data_dir.display()
            );
            return Ok(());
        }

        fs::create_dir_all(&self.paths.data_dir).with_context(|| {
            format!("creating data directory {}", self.paths.data_dir.display())
        })?;
        Ok(())
    }

    fn public_dir(&self) -> Result<PathBuf> {
        match self.config.files.public_dir {
            Some(ref dir) => expand_str_path(dir),
            None => Ok(self.paths.data_dir.join("public")),
        }
    }

    fn store_file(&self) -> Result<PathBuf> {
        match self.config.client.store_file {
            Some(ref file) => expand_str_path(file),
            None => Ok(self.paths.data_dir.join("conversations.json")),
        }
    }

    /// Build an unlocked session or fail on a wrong password.
    fn open_session(&self, args: &SessionArgs) -> Result<ChatSession> {
        let client = &self.config.client;
        let server = args.server.as_deref().unwrap_or(&client.server_url);
        let http = KinchatClient::new(server).context("creating HTTP client")?;

        let store = LocalConversationStore::new(self.store_file()?, client.storage_key.clone())
            .with_capacity(client.max_conversations);
        let mut session = ChatSession::new(http, Box::new(store), client.password.clone());

        let password = args
            .password
            .as_deref()
            .ok_or_else(|| anyhow!("session is locked (pass --password or set KINCHAT_PASSWORD)"))?;
        if !session.unlock(password) {
            return Err(anyhow!("incorrect password"));
        }
        Ok(session)
    }

    fn print<T: serde::Serialize + fmt::Debug>(&self, value: &T) -> Result<bool> {
        if self.common.json {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("serializing output to JSON")?
            );
        } else if self.common.yaml {
            println!(
                "{}",
                serde_yaml::to_string(value).context("serializing output to YAML")?
            );
        } else {
            return Ok(false);
        }
        Ok(true)
    }
}

#[derive(Debug, Clone)]
struct AppPaths {
    config_file: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    fn discover(override_path: Option<PathBuf>) -> Result<Self> {
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
        })
    }
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
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
            if !ctx.print(&ctx.config)? {
                println!("{:#?}", ctx.config);
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

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    let config = &ctx.config;

    let upstream = http_client(None).context("creating upstream HTTP client")?;
    let gemini_client =
        http_client(config.gemini.proxy.as_deref()).context("creating Gemini HTTP client")?;
    let gemini = Arc::new(GeminiProvider::new(&config.gemini, gemini_client));

    let chat: Arc<dyn ChatProvider> = match config.chat.provider {
        ChatProviderKind::Anthropic => {
            Arc::new(AnthropicProvider::new(&config.anthropic, upstream))
        }
        ChatProviderKind::Gemini => gemini.clone(),
    };
    let images: Arc<dyn ImageProvider> = gemini;

    if config.anthropic.api_key.is_none() && config.chat.provider == ChatProviderKind::Anthropic {
        warn!("anthropic.api_key is not set; chat requests will fail");
    }
    if config.gemini.api_key.is_none() {
        warn!("gemini.api_key is not set; image requests will fail");
    }

    let public_dir = ctx.public_dir()?;
    fs::create_dir_all(&public_dir)
        .with_context(|| format!("creating public directory {}", public_dir.display()))?;
    let files = FileGateway::with_config(&public_dir, config.files.gateway_config());
    info!("Serving files from {}", public_dir.display());

    let state =
        AppState::new(chat, images, files).with_cors_origins(config.server.cors_origins.clone());
    let app = api::create_router(state);

    let host = cmd.host.as_deref().unwrap_or(&config.server.host);
    let port = cmd.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("invalid address")?;

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .context("binding to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
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

    info!("Shutdown signal received");
}

async fn resume(session: &mut ChatSession, conversation: Option<&str>) -> Result<()> {
    if let Some(id) = conversation {
        session
            .open(id)
            .await
            .with_context(|| format!("opening conversation {id}"))?;
    }
    Ok(())
}

async fn handle_chat(ctx: &RuntimeContext, cmd: ChatCommand) -> Result<()> {
    let mut session = ctx.open_session(&cmd.session)?;
    resume(&mut session, cmd.conversation.as_deref()).await?;

    let intent = ChatIntent::Send {
        text: cmd.message,
        attachments: Vec::new(),
    };

    let streaming = !(ctx.common.json || ctx.common.yaml);
    let mut stdout = io::stdout();
    let reply = session
        .dispatch_with(intent, |fragment| {
            if streaming {
                let _ = write!(stdout, "{fragment}");
                let _ = stdout.flush();
            }
        })
        .await;

    if streaming {
        println!();
    }
    let reply = reply?;
    ctx.print(&reply)?;
    report_conversation(&session);
    Ok(())
}

async fn handle_health(ctx: &RuntimeContext, cmd: HealthCommand) -> Result<()> {
    let server = cmd
        .server
        .as_deref()
        .unwrap_or(&ctx.config.client.server_url);
    let client = KinchatClient::new(server).context("creating HTTP client")?;

    let health = client
        .health()
        .await
        .with_context(|| format!("checking {server}"))?;

    if !ctx.print(&health)? {
        println!("{} {} ({})", server, health.status, health.version);
    }
    Ok(())
}

async fn handle_image(ctx: &RuntimeContext, cmd: ImageCommand) -> Result<()> {
    let mut session = ctx.open_session(&cmd.session)?;
    resume(&mut session, cmd.conversation.as_deref()).await?;

    let reply = session
        .dispatch(ChatIntent::GenerateImage {
            prompt: cmd.prompt,
            source_image_url: cmd.source,
        })
        .await?;

    if !ctx.print(&reply)? {
        let url = reply.image_url.as_deref().unwrap_or_default();
        println!("{}{}", session.client().base_url(), url);
    }
    report_conversation(&session);
    Ok(())
}

async fn handle_analyze(ctx: &RuntimeContext, cmd: AnalyzeCommand) -> Result<()> {
    let mut session = ctx.open_session(&cmd.session)?;
    resume(&mut session, cmd.conversation.as_deref()).await?;

    let reply = session
        .dispatch(ChatIntent::AnalyzeImage {
            prompt: cmd.prompt,
            image_url: cmd.image_url,
        })
        .await?;

    if !ctx.print(&reply)? {
        println!("{}", reply.content);
    }
    report_conversation(&session);
    Ok(())
}

async fn handle_upload(ctx: &RuntimeContext, cmd: UploadCommand) -> Result<()> {
    let mut session = ctx.open_session(&cmd.session)?;

    if ctx.common.dry_run {
        info!("dry-run: would upload {}", cmd.path.display());
        return Ok(());
    }

    let attachment = session
        .client()
        .upload(&cmd.path)
        .await
        .with_context(|| format!("uploading {}", cmd.path.display()))?;

    if !ctx.print(&attachment)? {
        println!("{}", attachment.url);
    }

    if cmd.analyze {
        let reply = session
            .dispatch(ChatIntent::AnalyzeImage {
                prompt: None,
                image_url: attachment.url,
            })
            .await?;
        if !ctx.print(&reply)? {
            println!("{}", reply.content);
        }
        report_conversation(&session);
    }
    Ok(())
}

async fn handle_conversations(ctx: &RuntimeContext, command: ConversationsCommand) -> Result<()> {
    match command {
        ConversationsCommand::List(args) => {
            let session = ctx.open_session(&args)?;
            let conversations = session.conversations().await?;
            if !ctx.print(&conversations)? {
                for conversation in &conversations {
                    println!(
                        "{}  {}  {} ({} messages)",
                        conversation.id,
                        format_millis(conversation.updated_at),
                        conversation.title,
                        conversation.messages.len()
                    );
                }
            }
            Ok(())
        }
        ConversationsCommand::Show { id, session } => {
            let mut session = ctx.open_session(&session)?;
            let conversation = session.open(&id).await?.clone();
            if !ctx.print(&conversation)? {
                print_conversation(&conversation);
            }
            Ok(())
        }
        ConversationsCommand::Delete { id, session } => {
            let mut session = ctx.open_session(&session)?;
            if ctx.common.dry_run {
                info!("dry-run: would delete conversation {id}");
                return Ok(());
            }
            session.delete(&id).await?;
            info!("Deleted conversation {id}");
            Ok(())
        }
    }
}

fn report_conversation(session: &ChatSession) {
    if let Some(conversation) = session.current() {
        debug!("conversation {} ({})", conversation.id, conversation.title);
    }
}

fn print_conversation(conversation: &Conversation) {
    println!("# {}", conversation.title);
    for message in &conversation.messages {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    println!("\n[{}] {}:", format_millis(message.timestamp), who);
    println!("{}", message.content);
    if let Some(ref url) = message.image_url {
        println!("  image: {url}");
    }
    for attachment in &message.attachments {
        println!("  attachment: {} ({})", attachment.filename, attachment.url);
    }
}

fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn load_or_init_config(paths: &AppPaths, common: &CommonOpts) -> Result<AppConfig> {
    if !paths.config_file.exists() {
        if common.dry_run {
            info!(
                "dry-run: would create default config at {}",
                paths.config_file.display()
            );
        } else {
            write_default_config(&paths.config_file)?;
        }
    }

    let env_prefix = env_prefix();
    let built = Config::builder()
        .add_source(
            File::from(paths.config_file.as_path())
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(
            Environment::with_prefix(env_prefix.as_str())
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: AppConfig = built.try_deserialize()?;
    Ok(config)
}

fn write_default_config(path: &Path) -> Result<()> {
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
    buffer.push_str("# API keys may also come from ANTHROPIC_API_KEY and GEMINI_API_KEY.\n");
    buffer.push('\n');
    buffer
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
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

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config: {}, data: {}",
            self.config_file.display(),
            self.data_dir.display()
        )
    }
}
