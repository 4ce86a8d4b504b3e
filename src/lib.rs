//! Teachbot - teachable chat bot library
//!
//! A conversational response engine with:
//! - Teach mode: record question/answer pairs from chat
//! - SQLite-backed response store with multiple answers per question
//! - Approximate question matching with a configurable threshold
//! - TF-IDF + naive Bayes fallback when nothing matches closely
//! - Telegram and console channels
//!
//! # Example
//!
//! ```ignore
//! use teachbot::{EngineSettings, InboundMessage, QaStore, ResponseEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = QaStore::open("bot_memory.db").await?;
//!     let engine = ResponseEngine::new(store, EngineSettings::default()).await?;
//!     let reply = engine.handle(&InboundMessage::new("chat-1", "Hola")).await?;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod error;
pub mod memory;
pub mod matching;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod cli;

// Feature modules
pub mod messaging;
pub mod gateway;

// Re-export commonly used types for convenience
pub use classifier::{Classifier, Prediction};
pub use config::Config;
pub use conversation::{EngineSettings, ResponseEngine, TeachState};
pub use error::{EngineError, StoreError};
pub use matching::{find_best_match, similarity_ratio};
pub use memory::{QaPair, QaStore};
pub use types::{InboundMessage, OutboundMessage};
