use anyhow::Result;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use shopchat_core::{ChatController, Config, HttpBackendClient, MessageStore};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "shopchat")]
#[command(version, about = "Chat with the shop assistant and browse the products it suggests")]
struct Cli {
    /// Assistant backend base URL (overrides SHOPCHAT_BACKEND_URL, BACKEND_URL and the config file)
    #[arg(long)]
    backend_url: Option<String>,
    /// Give up on a reply after this many seconds (default: wait indefinitely)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
    /// Where to write logs (default: shopchat.log in the config directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match cli.log_file {
        Some(path) => path,
        None => default_log_path(),
    };
    init_logging(&log_path)?;

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not load config, using defaults");
        Config::new()
    });
    if cli.timeout.is_some() {
        config.request_timeout_secs = cli.timeout;
    }

    let backend_url = config.resolve_backend_url(cli.backend_url.as_deref());
    let client = HttpBackendClient::with_timeout(&backend_url, config.request_timeout())?;
    tracing::info!(
        backend = client.base_url(),
        timeout = ?config.request_timeout(),
        "starting chat session"
    );

    let store = MessageStore::new();
    let controller = ChatController::new(store.clone(), client);
    let mut app = App::new(controller, &config, &backend_url);
    let mut events = EventHandler::new(store.subscribe());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;
    tracing::info!(messages = store.len(), "chat session ended");

    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

fn default_log_path() -> PathBuf {
    Config::config_dir()
        .unwrap_or_else(|_| std::env::temp_dir())
        .join("shopchat.log")
}

/// Log to a file; stderr belongs to the terminal UI
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopchat=info,shopchat_core=info".into()),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
