//! /start command plugin.
//!
//! Handles the /start command and sends a welcome message.

use crate::bot::client::TelegramApi;
use crate::bot::types::Message;
use crate::error::Result;

pub const WELCOME_TEXT: &str = "Welcome! Send me a message and I'll echo it back.";

/// Handle the /start command.
pub async fn start_handler(api: &dyn TelegramApi, msg: &Message) -> Result<()> {
    super::reply(api, msg, WELCOME_TEXT).await
}
