//! Long-polling update source.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info};

use super::client::{PollParams, TelegramApi};
use super::dispatcher::{DEFAULT_BUFFER_SIZE, UpdateStream};
use super::types::Update;
use crate::config::PollingConfig;
use crate::error::{Error, Result};

/// Pulls updates with `getUpdates` until shut down.
pub struct PollingDispatcher {
    api: Arc<dyn TelegramApi>,
    config: PollingConfig,
    cancel: CancellationToken,
    started: AtomicBool,
    span: Span,
}

impl PollingDispatcher {
    pub fn new(api: Arc<dyn TelegramApi>, config: PollingConfig, span: Span) -> Self {
        Self {
            api,
            config,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            span,
        }
    }

    /// Clear any registered webhook, then spawn the long-poll loop.
    ///
    /// Telegram refuses `getUpdates` while a webhook is set, so a registration
    /// left behind by an earlier webhook run has to go first.
    pub async fn updates(&self) -> Result<UpdateStream> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }

        clear_webhook(self.api.as_ref())
            .instrument(self.span.clone())
            .await?;

        let params = PollParams {
            offset: self.config.offset,
            limit: self.config.limit,
            timeout: self.config.timeout,
        };
        let (tx, rx) = mpsc::channel(DEFAULT_BUFFER_SIZE);
        let producer = tokio::spawn(
            poll_loop(self.api.clone(), params, tx, self.cancel.clone())
                .instrument(self.span.clone()),
        );

        Ok(UpdateStream::new(rx, producer))
    }

    /// Cancel the poll loop. The stream closes once the loop notices.
    pub fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

async fn clear_webhook(api: &dyn TelegramApi) -> Result<()> {
    let info = api.get_webhook_info().await?;
    if info.is_set() {
        info!(url = ?info.url, "Removing webhook before polling");
        api.delete_webhook().await?;
    }
    Ok(())
}

/// Fetch batches and forward them in order until cancelled.
///
/// The offset only advances past updates that reached the channel. Anything
/// dropped on cancellation stays unconfirmed and is redelivered next start.
async fn poll_loop(
    api: Arc<dyn TelegramApi>,
    mut params: PollParams,
    tx: mpsc::Sender<Update>,
    cancel: CancellationToken,
) -> Result<()> {
    info!(
        offset = params.offset,
        limit = params.limit,
        timeout = params.timeout,
        "Long polling started"
    );

    'poll: loop {
        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'poll,
            batch = api.get_updates(params) => batch,
        };

        let updates = match batch {
            Ok(updates) => updates,
            Err(e) => {
                error!("Failed to fetch updates: {}", e);
                return Err(e);
            }
        };

        for update in updates {
            let next_offset = i32::try_from(update.id)
                .unwrap_or(i32::MAX)
                .saturating_add(1);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'poll,
                sent = tx.send(update) => {
                    if sent.is_err() {
                        info!("Update stream dropped by consumer");
                        return Ok(());
                    }
                }
            }
            params.offset = next_offset;
        }
    }

    info!("Long polling stopped");
    Ok(())
}
