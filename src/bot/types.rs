//! Update model shared by both delivery modes.
//!
//! Webhook bodies deserialize straight into these types; long-polling batches
//! are converted from teloxide's types in [`super::client`]. Only the fields
//! the bot reads are kept.

use serde::Deserialize;

/// An inbound Telegram update.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Update {
    #[serde(rename = "update_id")]
    pub id: u32,

    /// Set only for new incoming messages; other update kinds leave it empty.
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Message {
    #[serde(rename = "message_id")]
    pub id: i32,

    pub chat: Chat,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
}

/// Formatting annotation over a span of message text.
///
/// Offsets and lengths are counted in UTF-16 code units.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    BotCommand,
    #[serde(other)]
    Other,
}

impl Message {
    /// Non-empty message text.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}
