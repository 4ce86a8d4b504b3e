//! Messaging channels the bot talks through
//!
//! Supported channels:
//! - Telegram: Bot API long polling
//! - Console: stdin/stdout, one local conversation

pub mod console;
pub mod telegram;

use anyhow::Result;

use crate::types::{InboundMessage, OutboundMessage};

pub use console::ConsoleChannel;
pub use telegram::{TelegramClient, TelegramConfig};

/// Inbound/outbound text channel consumed by the gateway
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    /// Wait for the next batch of inbound messages.
    ///
    /// Returns `Ok(None)` once the channel is closed for good.
    async fn receive(&self) -> Result<Option<Vec<InboundMessage>>>;

    /// Deliver a reply
    async fn send(&self, reply: &OutboundMessage) -> Result<()>;

    /// Get channel name
    fn name(&self) -> &'static str;
}
