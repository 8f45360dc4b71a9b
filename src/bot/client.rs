//! Telegram Bot API client.
//!
//! [`TelegramApi`] lists the calls the dispatchers and handlers make. The
//! production implementation is [`TelegramClient`], a thin wrapper around
//! `teloxide::Bot`. All methods are safe to call concurrently.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, MessageEntityKind, UpdateKind};
use url::Url;

use super::types::{Chat, EntityKind, Message, MessageEntity, Update};
use crate::error::Result;

/// Extra time granted to an HTTP request on top of the long-poll wait.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Parameters of one `getUpdates` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollParams {
    pub offset: i32,
    pub limit: u8,
    pub timeout: u32,
}

/// Parameters of a `setWebhook` call.
#[derive(Debug, Clone)]
pub struct WebhookRegistration {
    pub url: Url,
    pub max_connections: u8,
    pub drop_pending_updates: bool,
    pub secret_token: String,
    /// PEM certificate uploaded for self-signed setups.
    pub certificate: Option<Vec<u8>>,
}

/// Current webhook registration as reported by Telegram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookInfo {
    pub url: Option<String>,
}

impl WebhookInfo {
    /// Whether a webhook URL is currently registered.
    pub fn is_set(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Telegram Bot API calls used by the bot.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn get_webhook_info(&self) -> Result<WebhookInfo>;

    async fn delete_webhook(&self) -> Result<()>;

    async fn set_webhook(&self, registration: WebhookRegistration) -> Result<()>;

    /// Fetch one batch of updates, waiting up to `params.timeout` seconds.
    async fn get_updates(&self, params: PollParams) -> Result<Vec<Update>>;
}

/// [`TelegramApi`] backed by teloxide.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    /// Create a client whose HTTP timeout outlasts a long-poll of `poll_timeout` seconds.
    pub fn new(token: &str, poll_timeout: u32) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(u64::from(poll_timeout)) + REQUEST_TIMEOUT_MARGIN)
            .build()?;

        Ok(Self {
            bot: Bot::with_client(token, client),
        })
    }
}

#[async_trait]
impl TelegramApi for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot.send_message(ChatId(chat_id), text.to_owned()).await?;
        Ok(())
    }

    async fn get_webhook_info(&self) -> Result<WebhookInfo> {
        let info = self.bot.get_webhook_info().await?;
        Ok(WebhookInfo {
            url: info.url.map(|u| u.to_string()),
        })
    }

    async fn delete_webhook(&self) -> Result<()> {
        self.bot.delete_webhook().await?;
        Ok(())
    }

    async fn set_webhook(&self, registration: WebhookRegistration) -> Result<()> {
        let mut request = self
            .bot
            .set_webhook(registration.url)
            .max_connections(registration.max_connections)
            .drop_pending_updates(registration.drop_pending_updates)
            .secret_token(registration.secret_token);

        if let Some(cert) = registration.certificate {
            request = request.certificate(InputFile::memory(cert).file_name("certificate.pem"));
        }

        request.await?;
        Ok(())
    }

    async fn get_updates(&self, params: PollParams) -> Result<Vec<Update>> {
        let updates = self
            .bot
            .get_updates()
            .offset(params.offset)
            .limit(params.limit)
            .timeout(params.timeout)
            .await?;

        Ok(updates.into_iter().map(convert_update).collect())
    }
}

fn convert_update(update: teloxide::types::Update) -> Update {
    let message = match &update.kind {
        UpdateKind::Message(msg) => Some(convert_message(msg)),
        _ => None,
    };

    Update {
        id: update.id.0,
        message,
    }
}

fn convert_message(msg: &teloxide::types::Message) -> Message {
    let entities = msg
        .entities()
        .unwrap_or_default()
        .iter()
        .map(|e| MessageEntity {
            kind: match e.kind {
                MessageEntityKind::BotCommand => EntityKind::BotCommand,
                _ => EntityKind::Other,
            },
            offset: e.offset,
            length: e.length,
        })
        .collect();

    Message {
        id: msg.id.0,
        chat: Chat { id: msg.chat.id.0 },
        text: msg.text().map(str::to_owned),
        entities,
    }
}
