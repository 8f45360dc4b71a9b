//! Error types for telebridge.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for bot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while starting, running or stopping the bot.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Updates were already requested from this dispatcher")]
    AlreadyStarted,

    #[error("Sending message timed out after {0:?}")]
    SendTimeout(Duration),

    #[error("Shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Wrap an I/O error with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
