//! Message handlers.
//!
//! Add new commands by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding a variant to `Command` and routing it in `handle_command()`

pub mod echo;
pub mod start;

use std::time::Duration;

use crate::bot::client::TelegramApi;
use crate::bot::types::{EntityKind, Message};
use crate::error::{Error, Result};

/// Reply for commands the bot does not know.
pub const UNKNOWN_COMMAND: &str = "unknown command";

/// Upper bound on a single outgoing message.
const SEND_TIMEOUT: Duration = Duration::from_secs(3);

/// All bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            _ => None,
        }
    }
}

/// Whether the message opens with a `bot_command` entity.
pub fn is_command(msg: &Message) -> bool {
    msg.entities
        .first()
        .is_some_and(|e| e.offset == 0 && e.kind == EntityKind::BotCommand)
}

/// Command name without the leading slash, e.g. `start` for `/start`.
///
/// Only messages passing [`is_command`] have one.
pub fn command_name(msg: &Message) -> Option<&str> {
    if !is_command(msg) {
        return None;
    }
    let entity = msg.entities.first()?;
    msg.text.as_deref()?.get(1..entity.length)
}

/// Route a command message; unknown names get [`UNKNOWN_COMMAND`].
pub async fn handle_command(api: &dyn TelegramApi, msg: &Message) -> Result<()> {
    match command_name(msg).and_then(Command::from_name) {
        Some(Command::Start) => start::start_handler(api, msg).await,
        None => reply(api, msg, UNKNOWN_COMMAND).await,
    }
}

/// Send `text` to the message's chat, giving up after [`SEND_TIMEOUT`].
pub async fn reply(api: &dyn TelegramApi, msg: &Message, text: &str) -> Result<()> {
    tokio::time::timeout(SEND_TIMEOUT, api.send_message(msg.chat.id, text))
        .await
        .map_err(|_| Error::SendTimeout(SEND_TIMEOUT))?
}
