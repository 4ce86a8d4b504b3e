//! Gateway - connects a messaging channel to the response engine
//!
//! Pulls inbound batches from the channel, runs each conversation's
//! messages in order on its own task, and sends the replies. Stops on
//! Ctrl-C or when the channel closes.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::conversation::ResponseEngine;
use crate::error::EngineError;
use crate::messaging::Channel;
use crate::types::{InboundMessage, OutboundMessage};

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Pause after a failed receive before polling again
    pub retry_delay: Duration,
    /// Stop on Ctrl-C
    pub handle_ctrl_c: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            handle_ctrl_c: true,
        }
    }
}

/// Counters reported when the gateway stops
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GatewayStats {
    pub received: u64,
    pub replied: u64,
    pub failed: u64,
}

/// The gateway loop
pub struct Gateway {
    engine: Arc<ResponseEngine>,
    channel: Arc<dyn Channel>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(engine: Arc<ResponseEngine>, channel: Arc<dyn Channel>) -> Self {
        Self::with_config(engine, channel, GatewayConfig::default())
    }

    pub fn with_config(engine: Arc<ResponseEngine>, channel: Arc<dyn Channel>, config: GatewayConfig) -> Self {
        Self { engine, channel, config }
    }

    /// Run until the channel closes or Ctrl-C is received
    pub async fn run(&self) -> Result<GatewayStats> {
        info!("Gateway running on {} channel", self.channel.name());
        let mut stats = GatewayStats::default();

        loop {
            let received = tokio::select! {
                received = self.channel.receive() => received,
                _ = shutdown_signal(self.config.handle_ctrl_c) => {
                    info!("Shutdown requested");
                    break;
                }
            };

            match received {
                Ok(Some(batch)) => self.dispatch(batch, &mut stats).await,
                Ok(None) => {
                    info!("{} channel closed", self.channel.name());
                    break;
                }
                Err(e) => {
                    warn!("Failed to receive from {}: {:#}", self.channel.name(), e);
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }

        info!(
            "Gateway stopped: {} received, {} replied, {} failed",
            stats.received, stats.replied, stats.failed
        );
        Ok(stats)
    }

    /// Process one batch: conversations in parallel, each in arrival order
    async fn dispatch(&self, batch: Vec<InboundMessage>, stats: &mut GatewayStats) {
        stats.received += batch.len() as u64;

        let mut by_conversation: HashMap<String, Vec<InboundMessage>> = HashMap::new();
        for message in batch {
            by_conversation
                .entry(message.conversation_id.clone())
                .or_default()
                .push(message);
        }

        let mut tasks = JoinSet::new();
        for (_, messages) in by_conversation {
            let engine = Arc::clone(&self.engine);
            let channel = Arc::clone(&self.channel);
            tasks.spawn(async move {
                let mut outcome = GatewayStats::default();
                for message in messages {
                    if process(&engine, channel.as_ref(), &message).await {
                        outcome.replied += 1;
                    } else {
                        outcome.failed += 1;
                    }
                }
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    stats.replied += outcome.replied;
                    stats.failed += outcome.failed;
                }
                Err(e) => error!("Conversation task panicked: {}", e),
            }
        }
    }
}

/// Handle a message and send the reply; returns whether it went out cleanly
async fn process(engine: &ResponseEngine, channel: &dyn Channel, message: &InboundMessage) -> bool {
    let (reply, ok) = match engine.handle(message).await {
        Ok(reply) => (reply, true),
        Err(e) => {
            error!("Failed to handle message in {}: {}", message.conversation_id, e);
            let replies = &engine.settings().replies;
            let text = match e {
                EngineError::Storage(_) => &replies.storage_failure,
                EngineError::Lookup(_) => &replies.lookup_failure,
            };
            (OutboundMessage::new(&message.conversation_id, text), false)
        }
    };

    match channel.send(&reply).await {
        Ok(()) => ok,
        Err(e) => {
            warn!("Failed to send reply to {}: {:#}", reply.conversation_id, e);
            false
        }
    }
}

async fn shutdown_signal(enabled: bool) {
    if enabled {
        if tokio::signal::ctrl_c().await.is_ok() {
            return;
        }
        warn!("Ctrl-C handler unavailable");
    }
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Replies;
    use crate::conversation::EngineSettings;
    use crate::memory::QaStore;
    use tokio::sync::Mutex;

    /// Channel replaying scripted batches and recording replies
    struct ScriptedChannel {
        batches: Mutex<Vec<Vec<InboundMessage>>>,
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl ScriptedChannel {
        fn new(mut batches: Vec<Vec<InboundMessage>>) -> Self {
            batches.reverse();
            Self {
                batches: Mutex::new(batches),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Channel for ScriptedChannel {
        async fn receive(&self) -> Result<Option<Vec<InboundMessage>>> {
            Ok(self.batches.lock().await.pop())
        }

        async fn send(&self, reply: &OutboundMessage) -> Result<()> {
            self.sent.lock().await.push(reply.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn msg(conversation: &str, text: &str) -> InboundMessage {
        InboundMessage::new(conversation, text)
    }

    async fn run_scripted(engine: ResponseEngine, batches: Vec<Vec<InboundMessage>>) -> (GatewayStats, Vec<String>) {
        let channel = Arc::new(ScriptedChannel::new(batches));
        let config = GatewayConfig { handle_ctrl_c: false, ..GatewayConfig::default() };
        let gateway = Gateway::with_config(Arc::new(engine), channel.clone(), config);
        let stats = gateway.run().await.unwrap();

        let sent = channel.sent.lock().await.iter().map(|r| r.text.clone()).collect();
        (stats, sent)
    }

    #[tokio::test]
    async fn test_replies_in_order_per_conversation() {
        let store = QaStore::open_in_memory().unwrap();
        let engine = Arc::new(ResponseEngine::new(store, EngineSettings::default()).await.unwrap());

        let channel = Arc::new(ScriptedChannel::new(vec![
            vec![msg("a", "stnelly141"), msg("b", "hola")],
            vec![msg("a", "hola"), msg("a", "buenas")],
            vec![msg("a", "no"), msg("a", "stnelly141")],
            vec![msg("b", "hola")],
        ]));

        let config = GatewayConfig { handle_ctrl_c: false, ..GatewayConfig::default() };
        let gateway = Gateway::with_config(engine, channel.clone(), config);
        let stats = gateway.run().await.unwrap();

        assert_eq!(stats, GatewayStats { received: 7, replied: 7, failed: 0 });

        let sent = channel.sent.lock().await;
        let to_a: Vec<_> = sent.iter().filter(|r| r.conversation_id == "a").map(|r| r.text.as_str()).collect();
        let settings = EngineSettings::default();
        assert_eq!(to_a[0], settings.replies.learning_on);
        assert_eq!(to_a[1], settings.replies.ask_answer);
        assert_eq!(to_a[2], settings.replies.answer_saved);

        // "b" asked before and after "a" taught the answer
        let to_b: Vec<_> = sent.iter().filter(|r| r.conversation_id == "b").map(|r| r.text.as_str()).collect();
        assert_eq!(to_b, vec![settings.replies.insufficient_data.as_str(), "buenas"]);
    }

    #[tokio::test]
    async fn test_failed_insert_gets_storage_failure_reply() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("bot_memory.db");
        let store = QaStore::open(&db).await.unwrap();
        let engine = ResponseEngine::new(store, EngineSettings::default()).await.unwrap();

        rusqlite::Connection::open(&db).unwrap().execute_batch(
            "CREATE TRIGGER read_only BEFORE INSERT ON responses
             BEGIN SELECT RAISE(ABORT, 'read only'); END;",
        ).unwrap();

        let (stats, sent) = run_scripted(engine, vec![
            vec![msg("a", "stnelly141"), msg("a", "hola"), msg("a", "buenas")],
        ]).await;

        let replies = Replies::default();
        assert_eq!(stats, GatewayStats { received: 3, replied: 2, failed: 1 });
        assert_eq!(sent, vec![replies.learning_on, replies.ask_answer, replies.storage_failure]);
    }

    #[tokio::test]
    async fn test_failed_query_gets_lookup_failure_reply() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("bot_memory.db");
        let store = QaStore::open(&db).await.unwrap();
        let engine = ResponseEngine::new(store, EngineSettings::default()).await.unwrap();

        // A question stored as a blob cannot be read back as text
        rusqlite::Connection::open(&db).unwrap().execute_batch(
            "INSERT INTO responses VALUES (x'00ff', 'respuesta');",
        ).unwrap();

        let (stats, sent) = run_scripted(engine, vec![vec![msg("b", "hola")]]).await;

        assert_eq!(stats, GatewayStats { received: 1, replied: 0, failed: 1 });
        assert_eq!(sent, vec![Replies::default().lookup_failure]);
    }
}
