//! Echo plugin.
//!
//! Replies to plain text messages with the same text.

use crate::bot::client::TelegramApi;
use crate::bot::types::Message;
use crate::error::Result;

/// Send the message text back to its chat.
pub async fn echo_handler(api: &dyn TelegramApi, msg: &Message) -> Result<()> {
    match msg.text() {
        Some(text) => super::reply(api, msg, text).await,
        None => Ok(()),
    }
}
