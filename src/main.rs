//! catalog-player - browse a remote music catalog and play streams from the
//! terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

mod action;
mod app;
mod catalog;
mod client;
mod config;
mod player;
mod view;

use action::Action;
use app::App;
use catalog::CatalogProvider;
use client::SubsonicClient;
use config::Config;
use player::{ControllerMessage, PlaybackController, RodioEngine};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "catalog-player")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server URL (overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// Username (overrides config)
    #[arg(short, long)]
    username: Option<String>,

    /// Password (overrides config)
    #[arg(short, long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let log_file = init_logging()?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };

    // Apply command-line overrides
    if let Some(server) = args.server {
        config.server.url = server;
    }
    if let Some(username) = args.username {
        config.server.username = username;
    }
    if let Some(password) = args.password {
        config.server.password = Some(password);
    }

    let credentials = match config.credentials() {
        Some(credentials) if config.is_valid() => credentials,
        _ => {
            return Err(eyre!(
                "Invalid configuration: set a server URL and credentials in {} or pass --server/--username/--password",
                config_hint(args.config.as_deref())
            ))
        }
    };

    let client = SubsonicClient::new(&config.server.url, credentials)
        .with_stream_options(config.stream_options());
    match client.ping().await {
        Ok(()) => tracing::info!("Connected to server: {}", config.server.url),
        Err(e) => {
            tracing::error!("Failed to connect to server: {}", e);
            println!("warning: failed to connect to {}: {}", config.server.url, e);
        }
    }
    let provider: Arc<dyn CatalogProvider> = Arc::new(client);

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();

    let (controller, mut controller_rx) = match RodioEngine::new(config.player.volume) {
        Ok(engine) => {
            let (controller, rx) = PlaybackController::new(
                Arc::clone(&provider),
                Box::new(engine),
                updates_tx,
                Duration::from_millis(config.player.progress_interval_ms),
            );
            (Some(controller), Some(rx))
        }
        Err(e) => {
            tracing::error!("Failed to initialize audio output: {}", e);
            println!("warning: {e}; playback is disabled");
            (None, None)
        }
    };

    let mut app = App::new(config, provider, controller, action_tx);
    println!("catalog-player ready, logging to {}. Type help for commands.", log_file.display());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => app.handle_line(&line)?,
                None => break,
            },
            Some(action) = action_rx.recv() => app.handle_action(action)?,
            Some(message) = next_message(&mut controller_rx) => {
                app.handle_controller_message(message);
            }
            Some(update) = updates_rx.recv() => app.handle_session_update(update),
        }

        for line in app.drain_output() {
            println!("{line}");
        }

        if app.should_quit {
            break;
        }
    }

    app.shutdown();
    Ok(())
}

/// Log to a file in the cache directory so output never interleaves with
/// the prompt.
fn init_logging() -> Result<PathBuf> {
    let log_file = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("catalog-player")
        .join("catalog-player.log");

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(&log_file)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init()
        .ok();

    Ok(log_file)
}

/// Next controller message, or never when playback is disabled.
async fn next_message(
    rx: &mut Option<mpsc::UnboundedReceiver<ControllerMessage>>,
) -> Option<ControllerMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn config_hint(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => Config::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| String::from("the config file")),
    }
}
