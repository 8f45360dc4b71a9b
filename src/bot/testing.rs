//! In-memory [`TelegramApi`] for tests.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::client::{PollParams, TelegramApi, WebhookInfo, WebhookRegistration};
use super::types::{Chat, EntityKind, Message, MessageEntity, Update};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendMessage,
    GetWebhookInfo,
    DeleteWebhook,
    SetWebhook,
    GetUpdates(PollParams),
}

type Batch = Result<Vec<Update>>;

/// Records every call; `get_updates` blocks until a batch is pushed.
pub struct FakeApi {
    webhook: Mutex<WebhookInfo>,
    calls: Mutex<Vec<Call>>,
    registrations: Mutex<Vec<WebhookRegistration>>,
    fail_sends: Mutex<bool>,
    feed: mpsc::UnboundedSender<Batch>,
    batches: tokio::sync::Mutex<mpsc::UnboundedReceiver<Batch>>,
    sent_tx: mpsc::UnboundedSender<(i64, String)>,
    sent_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(i64, String)>>,
}

impl FakeApi {
    pub fn new() -> Self {
        let (feed, batches) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        Self {
            webhook: Mutex::new(WebhookInfo::default()),
            calls: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            fail_sends: Mutex::new(false),
            feed,
            batches: tokio::sync::Mutex::new(batches),
            sent_tx,
            sent_rx: tokio::sync::Mutex::new(sent_rx),
        }
    }

    /// Pretend a webhook is already registered.
    pub fn with_webhook(self, url: &str) -> Self {
        *self.webhook.lock() = WebhookInfo {
            url: Some(url.to_string()),
        };
        self
    }

    pub fn push(&self, updates: Vec<Update>) {
        let _ = self.feed.send(Ok(updates));
    }

    pub fn push_error(&self, error: Error) {
        let _ = self.feed.send(Err(error));
    }

    pub fn fail_sends(&self) {
        *self.fail_sends.lock() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn registrations(&self) -> Vec<WebhookRegistration> {
        self.registrations.lock().clone()
    }

    /// Wait for the next message passed to `send_message`.
    pub async fn next_sent(&self) -> (i64, String) {
        let mut rx = self.sent_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no message sent within 5s")
            .expect("sent channel closed")
    }

    /// Messages sent so far that nobody awaited yet.
    pub fn try_sent(&self) -> Vec<(i64, String)> {
        let mut out = Vec::new();
        if let Ok(mut rx) = self.sent_rx.try_lock() {
            while let Ok(item) = rx.try_recv() {
                out.push(item);
            }
        }
        out
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl TelegramApi for FakeApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.record(Call::SendMessage);
        let _ = self.sent_tx.send((chat_id, text.to_string()));
        if *self.fail_sends.lock() {
            return Err(Error::HttpClient(reqwest::Client::new().get("not a url").build().unwrap_err()));
        }
        Ok(())
    }

    async fn get_webhook_info(&self) -> Result<WebhookInfo> {
        self.record(Call::GetWebhookInfo);
        Ok(self.webhook.lock().clone())
    }

    async fn delete_webhook(&self) -> Result<()> {
        self.record(Call::DeleteWebhook);
        *self.webhook.lock() = WebhookInfo::default();
        Ok(())
    }

    async fn set_webhook(&self, registration: WebhookRegistration) -> Result<()> {
        self.record(Call::SetWebhook);
        *self.webhook.lock() = WebhookInfo {
            url: Some(registration.url.to_string()),
        };
        self.registrations.lock().push(registration);
        Ok(())
    }

    async fn get_updates(&self, params: PollParams) -> Result<Vec<Update>> {
        self.record(Call::GetUpdates(params));
        let mut batches = self.batches.lock().await;
        match batches.recv().await {
            Some(batch) => batch,
            None => std::future::pending().await,
        }
    }
}

/// Build a text message update.
pub fn text_update(id: u32, text: &str, entities: Vec<MessageEntity>) -> Update {
    Update {
        id,
        message: Some(Message {
            id: id as i32,
            chat: Chat { id: 42 },
            text: Some(text.to_string()),
            entities,
        }),
    }
}

/// Build a `bot_command` entity.
pub fn command_entity(offset: usize, length: usize) -> MessageEntity {
    MessageEntity {
        kind: EntityKind::BotCommand,
        offset,
        length,
    }
}

/// Write a self-signed certificate and key for `localhost` into `dir`.
pub fn write_self_signed(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
    let cert = params.self_signed(&key_pair).unwrap();

    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();
    (cert_path, key_path)
}
