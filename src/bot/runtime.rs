//! Bot runtime - consume loop and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, error, info};

use super::client::{TelegramApi, TelegramClient};
use super::dispatcher::Dispatcher;
use super::types::Update;
use crate::config::BotConfig;
use crate::error::Result;
use crate::plugins;

/// Owns the Telegram client and the configured dispatcher.
pub struct Bot {
    api: Arc<dyn TelegramApi>,
    dispatcher: Dispatcher,
}

impl Bot {
    /// Build the client and the dispatcher variant for the configured mode.
    pub fn new(config: &BotConfig) -> Result<Self> {
        let api: Arc<dyn TelegramApi> =
            Arc::new(TelegramClient::new(&config.token, config.polling.timeout)?);
        let dispatcher = Dispatcher::new(api.clone(), config);
        Ok(Self::with_dispatcher(api, dispatcher))
    }

    pub fn with_dispatcher(api: Arc<dyn TelegramApi>, dispatcher: Dispatcher) -> Self {
        Self { api, dispatcher }
    }

    /// Consume updates until the stream closes.
    ///
    /// Setup errors are returned before any update is read. After the stream
    /// closes, the producer's terminal error (if any) is returned.
    pub async fn run(&self) -> Result<()> {
        let mut updates = self.dispatcher.updates().await?;
        info!("Bot started, waiting for updates...");

        while let Some(update) = updates.next().await {
            self.handle_update(update).await;
        }

        info!("Update stream closed");
        updates.finish().await
    }

    /// Stop the dispatcher. The caller still has to wait for `run` to return.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.dispatcher.shutdown(timeout).await
    }

    async fn handle_update(&self, update: Update) {
        // Ignore all non-message updates
        let Some(msg) = update.message else {
            return;
        };
        // Ignore all non-text messages
        if msg.text().is_none() {
            return;
        }

        let api = self.api.as_ref();
        let result = if plugins::is_command(&msg) {
            debug!(chat = msg.chat.id, message = msg.id, "Command received");
            plugins::handle_command(api, &msg).await
        } else {
            plugins::echo::echo_handler(api, &msg).await
        };

        if let Err(e) = result {
            error!("Error sending message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing::Span;

    use super::*;
    use crate::bot::client::WebhookInfo;
    use crate::bot::polling::PollingDispatcher;
    use crate::bot::testing::{Call, FakeApi, command_entity, text_update};
    use crate::bot::types::{Chat, Message};
    use crate::config::{Config, PollingConfig};
    use crate::error::Error;
    use crate::plugins::UNKNOWN_COMMAND;
    use crate::plugins::start::WELCOME_TEXT;

    fn polling_bot(api: Arc<FakeApi>) -> Arc<Bot> {
        let config = PollingConfig {
            offset: 0,
            limit: 10,
            timeout: 5,
        };
        let dispatcher =
            Dispatcher::Polling(PollingDispatcher::new(api.clone(), config, Span::none()));
        Arc::new(Bot::with_dispatcher(api, dispatcher))
    }

    fn sends(api: &FakeApi) -> usize {
        api.calls()
            .iter()
            .filter(|c| **c == Call::SendMessage)
            .count()
    }

    #[tokio::test]
    async fn test_start_command_routed() {
        let api = Arc::new(FakeApi::new());
        let bot = polling_bot(api.clone());
        let run = tokio::spawn({
            let bot = bot.clone();
            async move { bot.run().await }
        });

        api.push(vec![text_update(1, "/start", vec![command_entity(0, 6)])]);

        assert_eq!(api.next_sent().await, (42, WELCOME_TEXT.to_string()));
        assert_eq!(api.calls()[0], Call::GetWebhookInfo);

        bot.shutdown(Duration::from_secs(1)).await.unwrap();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_plain_text_echoed() {
        let api = Arc::new(FakeApi::new());
        let bot = polling_bot(api.clone());
        let run = tokio::spawn({
            let bot = bot.clone();
            async move { bot.run().await }
        });

        api.push(vec![text_update(1, "hello", Vec::new())]);

        assert_eq!(api.next_sent().await, (42, "hello".to_string()));

        bot.shutdown(Duration::from_secs(1)).await.unwrap();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unknown_command_reply() {
        let api = Arc::new(FakeApi::new());
        let bot = polling_bot(api.clone());
        let run = tokio::spawn({
            let bot = bot.clone();
            async move { bot.run().await }
        });

        api.push(vec![text_update(1, "/dance", vec![command_entity(0, 6)])]);

        assert_eq!(api.next_sent().await.1, UNKNOWN_COMMAND);

        bot.shutdown(Duration::from_secs(1)).await.unwrap();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_updates_without_text_are_ignored() {
        let api = Arc::new(FakeApi::new());
        let bot = polling_bot(api.clone());
        let run = tokio::spawn({
            let bot = bot.clone();
            async move { bot.run().await }
        });

        let no_message = Update { id: 1, message: None };
        let no_text = Update {
            id: 2,
            message: Some(Message {
                id: 2,
                chat: Chat { id: 42 },
                text: None,
                entities: Vec::new(),
            }),
        };
        let empty = text_update(3, "", vec![command_entity(0, 1)]);
        api.push(vec![no_message, no_text, empty, text_update(4, "last", Vec::new())]);

        // FIFO: once "last" is answered the three before it were skipped.
        assert_eq!(api.next_sent().await.1, "last");
        assert_eq!(sends(&api), 1);

        bot.shutdown(Duration::from_secs(1)).await.unwrap();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_loop() {
        let api = Arc::new(FakeApi::new());
        api.fail_sends();
        let bot = polling_bot(api.clone());
        let run = tokio::spawn({
            let bot = bot.clone();
            async move { bot.run().await }
        });

        api.push(vec![text_update(1, "first", Vec::new())]);
        api.push(vec![text_update(2, "second", Vec::new())]);

        assert_eq!(api.next_sent().await.1, "first");
        assert_eq!(api.next_sent().await.1, "second");

        bot.shutdown(Duration::from_secs(1)).await.unwrap();
        run.await.unwrap().unwrap();
        assert!(api.try_sent().is_empty());
    }

    #[tokio::test]
    async fn test_producer_error_ends_run() {
        let api = Arc::new(FakeApi::new());
        let bot = polling_bot(api.clone());
        let run = tokio::spawn({
            let bot = bot.clone();
            async move { bot.run().await }
        });

        api.push_error(Error::HttpClient(reqwest::Client::new().get("not a url").build().unwrap_err()));

        let result = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::HttpClient(_))));
    }

    #[tokio::test]
    async fn test_webhook_mode_end_to_end_setup() {
        let api = Arc::new(FakeApi::new());
        let config = Config::from_yaml(
            "bot:\n  token: t\n  mode: webhook\n  webhook:\n    url: https://example.com/hook\n    port: 18443\n",
        )
        .unwrap();
        let dispatcher = Dispatcher::new(api.clone(), &config.bot);
        let bot = Arc::new(Bot::with_dispatcher(api.clone(), dispatcher));
        let run = tokio::spawn({
            let bot = bot.clone();
            async move { bot.run().await }
        });

        tokio::time::timeout(Duration::from_secs(1), async {
            while api.registrations().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(!api.registrations()[0].secret_token.is_empty());
        assert!(!api.calls().contains(&Call::GetWebhookInfo));

        bot.shutdown(Duration::from_secs(5)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_ne!(
            api.get_webhook_info().await.unwrap(),
            WebhookInfo::default(),
            "webhook registration survives shutdown"
        );
    }
}
