//! Update dispatcher.
//!
//! Hides the delivery mode behind one contract: [`Dispatcher::updates`] starts
//! a single producer task and hands back its [`UpdateStream`];
//! [`Dispatcher::shutdown`] stops the producer and releases whatever the mode
//! set up. Each method is meant to be called once per instance.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info_span;

use super::client::TelegramApi;
use super::polling::PollingDispatcher;
use super::types::Update;
use super::webhook::WebhookDispatcher;
use crate::config::{BotConfig, BotMode};
use crate::error::Result;

/// Capacity of the channel between a producer and the consumer.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Ordered stream of updates fed by exactly one producer task.
///
/// Ends once the producer exits. Call [`UpdateStream::finish`] afterwards to
/// learn whether it stopped cleanly.
pub struct UpdateStream {
    rx: mpsc::Receiver<Update>,
    producer: JoinHandle<Result<()>>,
}

impl UpdateStream {
    pub(crate) fn new(rx: mpsc::Receiver<Update>, producer: JoinHandle<Result<()>>) -> Self {
        Self { rx, producer }
    }

    /// Join the producer and return the error that ended it, if any.
    pub async fn finish(self) -> Result<()> {
        drop(self.rx);
        self.producer.await?
    }
}

impl Stream for UpdateStream {
    type Item = Update;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Update>> {
        self.rx.poll_recv(cx)
    }
}

/// Source of updates, chosen once from configuration.
pub enum Dispatcher {
    Polling(PollingDispatcher),
    Webhook(WebhookDispatcher),
}

impl Dispatcher {
    /// Build the dispatcher variant for `config.mode`.
    pub fn new(api: Arc<dyn TelegramApi>, config: &BotConfig) -> Self {
        let span = info_span!("dispatcher", mode = %config.mode);
        match config.mode {
            BotMode::Polling => {
                Self::Polling(PollingDispatcher::new(api, config.polling.clone(), span))
            }
            BotMode::Webhook => {
                Self::Webhook(WebhookDispatcher::new(api, config.webhook.clone(), span))
            }
        }
    }

    /// Perform mode-specific setup and start producing updates.
    pub async fn updates(&self) -> Result<UpdateStream> {
        match self {
            Self::Polling(d) => d.updates().await,
            Self::Webhook(d) => d.updates().await,
        }
    }

    /// Close the stream and tear down mode-specific resources within `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        match self {
            Self::Polling(d) => d.shutdown(),
            Self::Webhook(d) => d.shutdown(timeout).await,
        }
    }
}
