//! Shared types used across modules
//!
//! Messages flowing between a transport channel and the response engine.
//! The engine never sees transport objects, only these values.

use serde::{Deserialize, Serialize};

use crate::memory::normalize;

/// A message received from a channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    /// Conversation the message belongs to (chat id, "console", ...)
    pub conversation_id: String,
    /// Normalized text (lower-cased, trimmed)
    pub text: String,
}

impl InboundMessage {
    /// Build an inbound message, normalizing the raw text
    pub fn new(conversation_id: impl Into<String>, raw_text: &str) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: normalize(raw_text),
        }
    }
}

/// A reply to be delivered on a channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub conversation_id: String,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.conversation_id, self.text)
    }
}
