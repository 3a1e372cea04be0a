//! scrscr - screenshot watcher.
//!
//! This binary watches a screenshot directory and delivers each new capture:
//! uploaded over SFTP with the public link placed on the clipboard, or
//! copied straight onto the clipboard.
//!
//! # Commands
//!
//! - `scrscr run`: Start the watcher daemon
//! - `scrscr config`: Print the resolved configuration
//! - `scrscr detect`: Print the detected screenshot directory (macOS only)
//!
//! # Environment Variables
//!
//! See the `config` module for available configuration options.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use scrscr::config::Config;
use scrscr::delivery::Dispatcher;
use scrscr::detect::detect_screens_dir;
use scrscr::notifier::{DesktopNotifier, UserNotifier};
use scrscr::watcher::{ScreenshotEvent, ScreenshotWatcher};

/// Buffer size for the screenshot event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Time to wait for in-flight deliveries during shutdown.
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// scrscr - screenshot watcher.
///
/// Watches for new screenshots and delivers each one: uploaded over SFTP
/// with the public link placed on the clipboard, or copied straight onto
/// the clipboard.
#[derive(Parser, Debug)]
#[command(name = "scrscr")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    SCRSCR_SCREENS_DIR   Directory to watch (default: auto-detect on macOS)
    SCRSCR_ACTION        Delivery action: upload or clipboard (default: upload)
    SCRSCR_DOWNSCALE     Halve HiDPI captures before upload (default: false)
    SCRSCR_REMOVE        Delete the source file after delivery (default: false)
    SCRSCR_SFTP_HOST     Remote host (required for upload)
    SCRSCR_SFTP_PORT     Remote SSH port (default: 22)
    SCRSCR_SFTP_USER     Remote username (required for upload)
    SCRSCR_SFTP_PASS     Remote password (required for upload)
    SCRSCR_SFTP_PATH     Remote directory receiving uploads (required for upload)
    SCRSCR_VIEW_PATH     Public URL prefix mirroring the remote directory (required for upload)

EXAMPLES:
    # Show the resolved configuration
    scrscr config

    # Print the macOS screenshot directory
    scrscr detect

    # Start watching
    scrscr run

    # Watch a specific directory without uploading
    SCRSCR_SCREENS_DIR=~/Pictures SCRSCR_ACTION=clipboard scrscr run")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start watching for new screenshots.
    ///
    /// Watches the configured (or detected) directory and delivers each
    /// new screenshot per the configured action until interrupted.
    Run {
        /// Path to a config file (default: ~/.config/scrscr/config.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the resolved configuration.
    ///
    /// Shows the merged file, environment, and default values with the
    /// password redacted.
    Config {
        /// Path to a config file (default: ~/.config/scrscr/config.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the detected screenshot directory (macOS only).
    Detect,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Config { config } => run_show_config(config.as_deref()),
        Command::Detect => {
            let runtime = build_runtime()?;
            runtime.block_on(run_detect())
        }
        Command::Run { config } => {
            let runtime = build_runtime()?;
            runtime.block_on(run_watcher(config.as_deref()))
        }
    }
}

/// Initializes the async runtime for the commands that need one.
fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

/// Prints the resolved configuration with secrets redacted.
fn run_show_config(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    print!("{}", config.render());
    Ok(())
}

/// Prints the detected screenshot directory.
async fn run_detect() -> Result<()> {
    let dir = detect_screens_dir()
        .await
        .context("Failed to detect screenshot directory")?;
    println!("{}", dir.display());
    Ok(())
}

/// Runs the watcher until a shutdown signal arrives.
async fn run_watcher(config_path: Option<&Path>) -> Result<()> {
    init_logging();
    install_panic_hook();

    info!("Starting scrscr");

    let config = Config::load(config_path).context("Failed to load configuration")?;
    let config = Arc::new(config);

    info!(
        action = %config.action,
        downscale = config.downscale,
        remove = config.remove,
        "Configuration loaded"
    );

    let watch_dir = match &config.screens_dir {
        Some(dir) => dir.clone(),
        None => {
            let dir = detect_screens_dir().await.context(
                "Failed to detect the screenshot directory; set screens_dir or SCRSCR_SCREENS_DIR",
            )?;
            info!(watch_dir = %dir.display(), "Detected screenshot directory");
            dir
        }
    };

    let dispatcher = Dispatcher::new(Arc::clone(&config));

    let (watch_tx, mut watch_rx) = mpsc::channel::<ScreenshotEvent>(EVENT_CHANNEL_CAPACITY);

    let _watcher = ScreenshotWatcher::new(watch_dir.clone(), watch_tx).context(format!(
        "Failed to watch {}",
        watch_dir.display()
    ))?;

    info!(
        watch_dir = %watch_dir.display(),
        "Watching for new screenshots. Press Ctrl+C to stop."
    );

    let mut deliveries = JoinSet::new();

    loop {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                break;
            }

            Some(event) = watch_rx.recv() => {
                let dispatcher = dispatcher.clone();
                deliveries.spawn(async move {
                    dispatcher.handle(&event.path).await;
                });
            }

            Some(result) = deliveries.join_next(), if !deliveries.is_empty() => {
                if let Err(e) = result {
                    error!(error = %e, "Delivery task failed");
                }
            }
        }
    }

    // Graceful shutdown
    info!("Shutting down...");

    drain_deliveries(&mut deliveries).await;

    info!("scrscr stopped");
    Ok(())
}

/// Waits for in-flight deliveries to finish, up to the shutdown timeout.
async fn drain_deliveries(deliveries: &mut JoinSet<()>) {
    if deliveries.is_empty() {
        return;
    }

    info!(in_flight = deliveries.len(), "Waiting for in-flight deliveries");

    let drain = async {
        while deliveries.join_next().await.is_some() {}
    };

    if timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), drain)
        .await
        .is_err()
    {
        warn!("Shutdown timeout reached, abandoning in-flight deliveries");
    }
}

/// Initializes the tracing subscriber.
///
/// Uses the `RUST_LOG` environment variable if set, otherwise defaults
/// to `info` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Last-resort failure handler.
///
/// A panic on any worker thread is logged and surfaced as a generic
/// notification so a silent delivery never disappears without a trace.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        error!(panic = %info, "Unhandled panic");
        DesktopNotifier.notify_failure("Unexpected failure, check the logs");
    }));
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
