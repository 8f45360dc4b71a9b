//! Webhook update source.
//!
//! On start this:
//! 1. Parses the webhook URL from config
//! 2. Loads TLS material when enabled
//! 3. Registers the webhook with Telegram (every start, with a fresh secret)
//! 4. Spawns the receiving endpoint on the configured port
//! 5. Hands the endpoint the stream's sender, so every acknowledged update is
//!    already queued for the consumer
//!
//! Shutdown stops the endpoint and closes the stream once in-flight requests
//! finish. Updates queued before that stay readable. The registration at
//! Telegram is left in place; polling mode clears it on its next start.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info};
use url::Url;

use super::client::{TelegramApi, WebhookRegistration};
use super::dispatcher::{DEFAULT_BUFFER_SIZE, UpdateStream};
use super::types::Update;
use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::server::{Endpoint, Transport, webhook_router};

/// Length of the per-process secret token sent with `setWebhook`.
const SECRET_TOKEN_LEN: usize = 32;

/// Receives updates pushed by Telegram to a local HTTP(S) endpoint.
pub struct WebhookDispatcher {
    api: Arc<dyn TelegramApi>,
    config: WebhookConfig,
    secret: String,
    /// Stops the receiving endpoint and releases the stream.
    cancel: CancellationToken,
    server: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    span: Span,
}

impl WebhookDispatcher {
    pub fn new(api: Arc<dyn TelegramApi>, config: WebhookConfig, span: Span) -> Self {
        Self {
            api,
            config,
            secret: generate_secret(),
            cancel: CancellationToken::new(),
            server: Mutex::new(None),
            started: AtomicBool::new(false),
            span,
        }
    }

    /// Register the webhook, start the endpoint and return the update stream.
    pub async fn updates(&self) -> Result<UpdateStream> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }
        self.start().instrument(self.span.clone()).await
    }

    async fn start(&self) -> Result<UpdateStream> {
        let url = Url::parse(&self.config.url)?;

        // Load TLS before registering so a bad key never leaves Telegram
        // pushing to an endpoint that cannot start.
        let ssl = &self.config.ssl;
        let certificate = if ssl.enabled {
            let bytes = tokio::fs::read(&ssl.cert)
                .await
                .map_err(|e| Error::io(&ssl.cert, e))?;
            Some(bytes)
        } else {
            None
        };
        let transport = Transport::from_config(ssl)?;

        // Register on every start: url, limits or certificate may have changed.
        self.api
            .set_webhook(WebhookRegistration {
                url: url.clone(),
                max_connections: self.config.max_conn,
                drop_pending_updates: self.config.drop_pending_updates,
                secret_token: self.secret.clone(),
                certificate,
            })
            .await?;
        info!("Webhook registered: {}", url);

        let (tx, rx) = mpsc::channel(DEFAULT_BUFFER_SIZE);
        let router = webhook_router(url.path(), tx.clone(), &self.secret, self.cancel.clone());
        let endpoint = Endpoint::new(router, transport, self.config.port);

        let stop = self.cancel.clone();
        let server = tokio::spawn(
            async move {
                match endpoint.serve(stop).await {
                    Ok(()) => info!("Receiving endpoint stopped"),
                    Err(e) => error!("Receiving endpoint stopped with error: {}", e),
                }
            }
            .in_current_span(),
        );
        *self.server.lock() = Some(server);

        let producer = tokio::spawn(hold_open(tx, self.cancel.clone()));

        Ok(UpdateStream::new(rx, producer))
    }

    /// Stop the endpoint and wait for it within `timeout`.
    ///
    /// The stream ends once the endpoint has let go of its sender.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.cancel.cancel();

        let Some(server) = self.server.lock().take() else {
            return Ok(());
        };

        let abort = server.abort_handle();
        match tokio::time::timeout(timeout, server).await {
            Ok(joined) => Ok(joined?),
            Err(_) => {
                abort.abort();
                Err(Error::ShutdownTimeout(timeout))
            }
        }
    }
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Keep the stream open until shutdown.
///
/// If the endpoint dies early its sender is dropped, but the consumer still
/// sees the same lifecycle as in polling mode.
async fn hold_open(tx: mpsc::Sender<Update>, cancel: CancellationToken) -> Result<()> {
    cancel.cancelled().await;
    drop(tx);
    Ok(())
}
