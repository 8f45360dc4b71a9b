//! Configuration module for telebridge.
//!
//! Loads the bot configuration from a YAML file. The token may be left empty in
//! the file and supplied through the `BOT_TOKEN` environment variable instead.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Largest batch Telegram returns from a single `getUpdates` call.
pub const MAX_POLLING_LIMIT: u8 = 100;

/// Errors detected while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("bot token is required")]
    MissingToken,

    #[error("polling offset must be non-negative, got {0}")]
    PollingOffset(i32),

    #[error("polling limit must be between 1 and 100, got {0}")]
    PollingLimit(u8),

    #[error("webhook url is required")]
    MissingWebhookUrl,

    #[error("webhook url is invalid: {0}")]
    InvalidWebhookUrl(String),

    #[error("webhook port must be between 1 and 65535")]
    WebhookPort,

    #[error("webhook max connections must be at least 1")]
    WebhookMaxConn,

    #[error("webhook ssl cert is required")]
    MissingSslCert,

    #[error("webhook ssl key is required")]
    MissingSslKey,
}

/// Bot running mode
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    Polling,
    Webhook,
}

impl std::fmt::Display for BotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Polling => f.write_str("polling"),
            Self::Webhook => f.write_str("webhook"),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
}

/// Bot section of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,

    /// Raise log verbosity for the bot and the Telegram client.
    #[serde(default)]
    pub debug: bool,

    pub mode: BotMode,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Long-polling parameters passed to `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub offset: i32,
    pub limit: u8,
    /// Server-side wait in seconds.
    pub timeout: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: MAX_POLLING_LIMIT,
            timeout: 30,
        }
    }
}

/// Webhook registration and receiving endpoint parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Public URL Telegram pushes updates to. Its path is also the local route.
    pub url: String,
    /// Local port the receiving endpoint listens on.
    pub port: u16,
    pub max_conn: u8,
    pub drop_pending_updates: bool,
    pub ssl: SslConfig,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            port: 8443,
            max_conn: 40,
            drop_pending_updates: false,
            ssl: SslConfig::default(),
        }
    }
}

/// TLS material for the receiving endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    pub enabled: bool,
    /// PEM certificate, also uploaded to Telegram on registration.
    pub cert: PathBuf,
    /// PEM private key.
    pub key: PathBuf,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// An empty `bot.token` is filled from `BOT_TOKEN` when that variable is set.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_yaml(&content)?;
        if config.bot.token.is_empty() {
            if let Ok(token) = env::var("BOT_TOKEN") {
                config.bot.token = token;
            }
        }

        Ok(config)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check every field the selected mode depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bot.validate()
    }
}

impl BotConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        match self.mode {
            BotMode::Polling => self.polling.validate(),
            BotMode::Webhook => self.webhook.validate(),
        }
    }
}

impl PollingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.offset < 0 {
            return Err(ConfigError::PollingOffset(self.offset));
        }
        if self.limit < 1 || self.limit > MAX_POLLING_LIMIT {
            return Err(ConfigError::PollingLimit(self.limit));
        }
        Ok(())
    }
}

impl WebhookConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::MissingWebhookUrl);
        }
        let url = Url::parse(&self.url).map_err(|e| ConfigError::InvalidWebhookUrl(e.to_string()))?;
        if url.cannot_be_a_base() || url.host().is_none() {
            return Err(ConfigError::InvalidWebhookUrl(format!("{} has no host", self.url)));
        }
        if self.port == 0 {
            return Err(ConfigError::WebhookPort);
        }
        if self.max_conn < 1 {
            return Err(ConfigError::WebhookMaxConn);
        }
        if self.ssl.enabled {
            if self.ssl.cert.as_os_str().is_empty() {
                return Err(ConfigError::MissingSslCert);
            }
            if self.ssl.key.as_os_str().is_empty() {
                return Err(ConfigError::MissingSslKey);
            }
        }
        Ok(())
    }
}
