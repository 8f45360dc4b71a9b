//! Bot module - Core bot functionality.
//!
//! - `client` - Telegram Bot API calls behind the `TelegramApi` trait
//! - `dispatcher` - One update stream over polling or webhook delivery
//! - `runtime` - The `Bot` that consumes the stream and routes messages

pub mod client;
pub mod dispatcher;
pub mod polling;
mod runtime;
pub mod types;
pub mod webhook;

#[cfg(test)]
pub mod testing;

pub use runtime::Bot;
