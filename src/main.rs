//! Telebridge - Telegram bot template
//!
//! Receives updates through long-polling or a webhook, selected in the config
//! file, and echoes text messages back.
//!
//! ## Architecture
//!
//! - `config` - YAML configuration and validation
//! - `bot` - Telegram client, update dispatchers and the consume loop
//! - `server` - Receiving endpoint used in webhook mode
//! - `plugins` - Command and message handlers

mod bot;
mod config;
mod error;
mod plugins;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bot::Bot;
use config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Upper bound on graceful shutdown after a termination signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).context("failed to parse config")?;

    // If RUST_LOG is not set, default to "info" for our crate, or "debug"
    // everywhere relevant when the config asks for it
    let default_filter = if config.bot.debug {
        "telebridge=debug,teloxide=debug"
    } else {
        "telebridge=info,teloxide=warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    config.validate().context("invalid config")?;
    info!("Configuration loaded successfully");
    info!("Bot mode: {}", config.bot.mode);

    let bot = Arc::new(Bot::new(&config.bot).context("bot initialization failed")?);

    let run = tokio::spawn({
        let bot = bot.clone();
        async move {
            if let Err(e) = bot.run().await {
                error!("Bot stopped with error: {}", e);
            }
        }
    });

    shutdown_signal().await;
    info!("Shutting down...");

    bot.shutdown(SHUTDOWN_TIMEOUT)
        .await
        .context("bot shutdown failed")?;

    run.await?;
    info!("Bot stopped");
    Ok(())
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
