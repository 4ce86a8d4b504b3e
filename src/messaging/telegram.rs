//! Telegram messaging integration
//!
//! Uses the Telegram Bot API: `getUpdates` long polling for incoming
//! messages and `sendMessage` for replies.
//!
//! # Setup
//!
//! 1. Create a bot via @BotFather on Telegram
//! 2. Export the token as `BOT_TOKEN` (or put it in `.env`)
//! 3. Run `teachbot run`

use anyhow::{Result, Context, bail};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{info, error, debug};

use crate::config::Config;
use crate::messaging::Channel;
use crate::types::{InboundMessage, OutboundMessage};

/// Telegram client configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather (format: 123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11)
    pub bot_token: String,
    /// API base URL (for self-hosted bot API servers)
    pub api_base: String,
    /// Long-polling timeout in seconds
    pub poll_timeout_secs: u64,
}

impl TelegramConfig {
    /// Create a new config with bot token
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
        }
    }

    /// Load from main config
    pub fn from_config(config: &Config) -> Result<Self> {
        let bot_token = config.telegram.bot_token.clone()
            .context("Telegram bot token not configured. Set BOT_TOKEN or TELEGRAM_BOT_TOKEN.")?;

        Ok(Self {
            bot_token,
            api_base: config.telegram.api_base.trim_end_matches('/').to_string(),
            poll_timeout_secs: config.telegram.poll_timeout_secs,
        })
    }

    /// Check if Telegram is properly configured
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && self.bot_token.contains(':')
    }

    /// Get API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

/// Telegram API response envelope
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i32>,
}

impl<T> TelegramResponse<T> {
    fn into_result(self) -> Result<T> {
        if self.ok {
            self.result.context("No result in response")
        } else {
            let error_msg = self.description.unwrap_or_else(|| "Unknown error".to_string());
            error!("Telegram API error: {} (code: {:?})", error_msg, self.error_code);
            bail!("Telegram API error: {}", error_msg)
        }
    }
}

/// Telegram message info
#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub date: i64,
    pub text: Option<String>,
    pub chat: TelegramChat,
    pub from: Option<TelegramUser>,
}

/// Telegram chat info
#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub username: Option<String>,
}

/// Telegram user info
#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

/// Telegram update (incoming message/event)
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

impl TelegramUpdate {
    /// Plain text message as an inbound message; commands and
    /// non-text updates are skipped
    pub fn to_inbound(&self) -> Option<InboundMessage> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?;
        if text.trim_start().starts_with('/') {
            return None;
        }
        Some(InboundMessage::new(message.chat.id.to_string(), text))
    }
}

/// Send message request
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    limit: i32,
    timeout: u64,
    allowed_updates: Vec<&'static str>,
}

/// Telegram client for receiving messages and sending replies
#[derive(Debug)]
pub struct TelegramClient {
    config: TelegramConfig,
    http_client: reqwest::Client,
    /// Next update id to request; 0 means "from the start"
    offset: AtomicI64,
}

impl TelegramClient {
    /// Create a new Telegram client
    pub fn new(config: TelegramConfig) -> Result<Self> {
        if !config.is_configured() {
            bail!("Telegram bot token looks invalid");
        }

        // Must outlive the long-polling timeout
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.poll_timeout_secs + 30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
            offset: AtomicI64::new(0),
        })
    }

    /// Test the bot token and get bot info
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let url = self.config.api_url("getMe");

        let response: TelegramResponse<TelegramUser> = self.http_client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to Telegram API")?
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        response.into_result()
    }

    /// Send a text message
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<TelegramMessage> {
        let url = self.config.api_url("sendMessage");
        let request = SendMessageRequest { chat_id, text };

        debug!("Sending Telegram message to {}", chat_id);

        let response: TelegramResponse<TelegramMessage> = self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send Telegram message")?
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        response.into_result()
    }

    /// Get updates (incoming messages) with long polling
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<TelegramUpdate>> {
        let url = self.config.api_url("getUpdates");

        let request = GetUpdatesRequest {
            offset,
            limit: 100,
            timeout: self.config.poll_timeout_secs,
            allowed_updates: vec!["message"],
        };

        let response: TelegramResponse<Vec<TelegramUpdate>> = self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to get Telegram updates")?
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        response.into_result()
    }
}

#[async_trait::async_trait]
impl Channel for TelegramClient {
    async fn receive(&self) -> Result<Option<Vec<InboundMessage>>> {
        let offset = match self.offset.load(Ordering::Acquire) {
            0 => None,
            n => Some(n),
        };
        let updates = self.get_updates(offset).await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::Release);
        }

        let messages: Vec<_> = updates.iter().filter_map(TelegramUpdate::to_inbound).collect();
        if !messages.is_empty() {
            info!("Received {} Telegram message(s)", messages.len());
        }
        Ok(Some(messages))
    }

    async fn send(&self, reply: &OutboundMessage) -> Result<()> {
        self.send_message(&reply.conversation_id, &reply.text).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
