//! Response engine
//!
//! Owns the store and the fallback classifier behind a single read-write
//! lock, and a teach-mode state per conversation. Each conversation
//! handles one utterance at a time; different conversations run
//! concurrently and share the knowledge lock.

use rand::seq::IndexedRandom;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::state::{Action, Keywords, TeachState};
use crate::classifier::{Classifier, ClassifierStats, Prediction};
use crate::config::{Config, Replies};
use crate::error::EngineError;
use crate::matching::find_best_match;
use crate::memory::QaStore;
use crate::types::{InboundMessage, OutboundMessage};

/// Engine behaviour derived from configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub keywords: Keywords,
    /// Exclusive similarity threshold (0-100)
    pub threshold: f64,
    pub replies: Replies,
    /// Where to cache the classifier; `None` keeps it in memory only
    pub model_path: Option<PathBuf>,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            keywords: Keywords::from_config(&config.teach),
            threshold: config.matching.threshold,
            replies: config.replies.clone(),
            model_path: config.model_path().map(PathBuf::from),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        let config = Config::default();
        Self {
            keywords: Keywords::from_config(&config.teach),
            threshold: config.matching.threshold,
            replies: config.replies,
            model_path: None,
        }
    }
}

/// Snapshot of what the engine knows
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub rows: usize,
    pub distinct_questions: usize,
    pub classifier: Option<ClassifierStats>,
    pub conversations: usize,
}

/// Store and classifier, always read and replaced together
struct Knowledge {
    store: QaStore,
    classifier: Classifier,
}

pub struct ResponseEngine {
    knowledge: RwLock<Knowledge>,
    conversations: Mutex<HashMap<String, Arc<Mutex<TeachState>>>>,
    settings: EngineSettings,
}

impl ResponseEngine {
    /// Build an engine over `store`, loading or training the classifier
    pub async fn new(store: QaStore, settings: EngineSettings) -> Result<Self, EngineError> {
        let classifier = Classifier::load_or_train(settings.model_path.as_deref(), &store).await?;

        Ok(Self {
            knowledge: RwLock::new(Knowledge { store, classifier }),
            conversations: Mutex::new(HashMap::new()),
            settings,
        })
    }

    /// Open the configured store and build an engine over it
    pub async fn open(config: &Config) -> Result<Self, EngineError> {
        let store = QaStore::open(&config.storage.database_path).await?;
        Self::new(store, EngineSettings::from_config(config)).await
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Process one inbound utterance and produce the reply.
    ///
    /// On a storage failure the conversation keeps its previous state.
    pub async fn handle(&self, message: &InboundMessage) -> Result<OutboundMessage, EngineError> {
        let replies = &self.settings.replies;
        if message.text.is_empty() {
            return Ok(OutboundMessage::new(&message.conversation_id, &replies.did_not_understand));
        }

        let Some(slot) = self.conversation(message).await else {
            let text = self.respond(&message.text).await?;
            return Ok(OutboundMessage::new(&message.conversation_id, text));
        };
        let mut state = slot.lock().await;

        let step = state.plan(&message.text, &self.settings.keywords);
        let text = match &step.action {
            Action::ToggledOn => {
                info!("Teach mode on for conversation {}", message.conversation_id);
                replies.learning_on.clone()
            }
            Action::ToggledOff => {
                info!("Teach mode off for conversation {}", message.conversation_id);
                replies.learning_off.clone()
            }
            Action::QuestionSet => replies.ask_answer.clone(),
            Action::Record { question, answer } => {
                self.teach(question, answer).await?;
                replies.answer_saved.clone()
            }
            Action::AddAnother => replies.ask_next_answer.clone(),
            Action::FinishQuestion => replies
                .question_finished
                .replace("{keyword}", self.settings.keywords.toggle()),
            Action::Reprompt => replies.confirm_reprompt.clone(),
            Action::Query => self.respond(&message.text).await?,
        };

        debug!(
            "Conversation {}: {} -> {}",
            message.conversation_id, *state, step.next
        );
        *state = step.next;
        Ok(OutboundMessage::new(&message.conversation_id, text))
    }

    /// Read path: approximate match, then classifier, then fixed replies
    pub async fn respond(&self, query: &str) -> Result<String, EngineError> {
        let knowledge = self.knowledge.read().await;
        let questions = knowledge
            .store
            .list_distinct_questions()
            .await
            .map_err(EngineError::Lookup)?;

        if let Some(found) = find_best_match(query, &questions, self.settings.threshold) {
            let answers = knowledge
                .store
                .lookup_exact(found.candidate)
                .await
                .map_err(EngineError::Lookup)?;
            if let Some(answer) = pick_answer(&answers) {
                return Ok(answer);
            }
        }

        Ok(match knowledge.classifier.predict(query) {
            Prediction::Answer(answer) => {
                debug!("Classifier answered '{}'", query);
                answer
            }
            Prediction::Untrained => self.settings.replies.insufficient_data.clone(),
            Prediction::NoSignal => self.settings.replies.did_not_understand.clone(),
        })
    }

    /// Classifier prediction for a query
    pub async fn predict(&self, query: &str) -> Prediction {
        self.knowledge.read().await.classifier.predict(query)
    }

    /// Store a pair and retrain the classifier from the whole store.
    /// Nothing is stored unless the retraining snapshot could be read.
    async fn teach(&self, question: &str, answer: &str) -> Result<(), EngineError> {
        let mut knowledge = self.knowledge.write().await;
        let pairs = knowledge.store.insert_and_snapshot(question, answer).await?;
        info!("Learned a new answer for '{}'", question);

        if knowledge.classifier.train(&pairs) {
            self.persist(&knowledge.classifier).await;
        }
        Ok(())
    }

    /// Force a full retrain; returns whether a model was trained
    pub async fn retrain(&self) -> Result<bool, EngineError> {
        let mut knowledge = self.knowledge.write().await;
        let pairs = knowledge.store.all_pairs().await?;
        let trained = knowledge.classifier.train(&pairs);
        if trained {
            self.persist(&knowledge.classifier).await;
        }
        Ok(trained)
    }

    async fn persist(&self, classifier: &Classifier) {
        if let Some(path) = &self.settings.model_path {
            if let Err(e) = classifier.save(path).await {
                warn!("Failed to save classifier: {:#}", e);
            }
        }
    }

    /// All answers recorded for an exact question
    pub async fn lookup_exact(&self, question: &str) -> Result<Vec<String>, EngineError> {
        let knowledge = self.knowledge.read().await;
        Ok(knowledge.store.lookup_exact(question).await?)
    }

    /// Current teach-mode state of a conversation
    pub async fn state_of(&self, conversation_id: &str) -> TeachState {
        let slot = self.conversations.lock().await.get(conversation_id).cloned();
        match slot {
            Some(slot) => slot.lock().await.clone(),
            None => TeachState::default(),
        }
    }

    pub async fn stats(&self) -> Result<EngineStats, EngineError> {
        let conversations = self.conversations.lock().await.len();
        let knowledge = self.knowledge.read().await;
        Ok(EngineStats {
            rows: knowledge.store.count().await?,
            distinct_questions: knowledge.store.list_distinct_questions().await?.len(),
            classifier: knowledge.classifier.stats(),
            conversations,
        })
    }

    /// State slot for the message's conversation. A conversation only gets
    /// a slot once it turns teach mode on; until then `None`.
    async fn conversation(&self, message: &InboundMessage) -> Option<Arc<Mutex<TeachState>>> {
        let mut conversations = self.conversations.lock().await;
        if let Some(slot) = conversations.get(&message.conversation_id) {
            return Some(Arc::clone(slot));
        }

        let step = TeachState::default().plan(&message.text, &self.settings.keywords);
        if matches!(step.action, Action::Query) {
            return None;
        }
        let slot = Arc::new(Mutex::new(TeachState::default()));
        conversations.insert(message.conversation_id.clone(), Arc::clone(&slot));
        Some(slot)
    }
}

/// Uniformly random answer
fn pick_answer(answers: &[String]) -> Option<String> {
    answers.choose(&mut rand::rng()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn engine() -> ResponseEngine {
        let store = QaStore::open_in_memory().unwrap();
        ResponseEngine::new(store, EngineSettings::default()).await.unwrap()
    }

    async fn say(engine: &ResponseEngine, text: &str) -> String {
        engine.handle(&InboundMessage::new("chat", text)).await.unwrap().text
    }

    #[tokio::test]
    async fn test_teach_then_answer() {
        let engine = engine().await;
        let replies = Replies::default();

        assert_eq!(say(&engine, "stnelly141").await, replies.learning_on);
        assert_eq!(say(&engine, "Hello").await, replies.ask_answer);
        assert_eq!(say(&engine, "Hi").await, replies.answer_saved);
        assert!(say(&engine, "no").await.contains("stnelly141"));
        assert_eq!(say(&engine, "stnelly141").await, replies.learning_off);

        assert_eq!(say(&engine, "hello").await, "hi");
        assert_eq!(engine.state_of("chat").await, TeachState::LearningOff);
    }

    #[tokio::test]
    async fn test_empty_store_reports_insufficient_data() {
        let engine = engine().await;
        assert_eq!(say(&engine, "anything").await, Replies::default().insufficient_data);
    }

    #[tokio::test]
    async fn test_unmatched_query_uses_classifier() {
        let engine = engine().await;
        for text in ["stnelly141", "cual es tu color favorito", "el azul", "no", "stnelly141"] {
            say(&engine, text).await;
        }

        // Too far from the stored question for the matcher
        assert_eq!(say(&engine, "dime tu color").await, "el azul");
        assert_eq!(say(&engine, "zzz").await, Replies::default().did_not_understand);
    }

    #[tokio::test]
    async fn test_conversations_are_independent() {
        let engine = engine().await;
        engine.handle(&InboundMessage::new("teacher", "stnelly141")).await.unwrap();

        assert!(engine.state_of("teacher").await.learning_mode());
        assert!(!engine.state_of("student").await.learning_mode());

        let reply = engine.handle(&InboundMessage::new("student", "hola")).await.unwrap();
        assert_eq!(reply.conversation_id, "student");
        assert_eq!(reply.text, Replies::default().insufficient_data);
    }

    #[tokio::test]
    async fn test_teaching_persists_classifier() {
        let dir = tempdir().unwrap();
        let model_path = dir.path().join("classifier.json");
        let settings = EngineSettings {
            model_path: Some(model_path.clone()),
            ..EngineSettings::default()
        };

        let store = QaStore::open_in_memory().unwrap();
        let engine = ResponseEngine::new(store, settings).await.unwrap();
        assert!(!model_path.exists());

        for text in ["stnelly141", "hola", "buenas"] {
            say(&engine, text).await;
        }
        assert!(model_path.exists());

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.rows, 1);
        assert_eq!(stats.classifier.unwrap().trained_on, 1);
    }

    #[tokio::test]
    async fn test_retrain_on_empty_store() {
        let engine = engine().await;
        assert!(!engine.retrain().await.unwrap());
        assert_eq!(engine.predict("hola").await, Prediction::Untrained);
    }

    #[tokio::test]
    async fn test_only_teaching_conversations_keep_state() {
        let engine = engine().await;
        for id in ["a", "b", "c"] {
            engine.handle(&InboundMessage::new(id, "hola")).await.unwrap();
        }
        assert_eq!(engine.stats().await.unwrap().conversations, 0);

        engine.handle(&InboundMessage::new("teacher", "stnelly141")).await.unwrap();
        engine.handle(&InboundMessage::new("a", "hola")).await.unwrap();
        assert_eq!(engine.stats().await.unwrap().conversations, 1);
        assert_eq!(engine.state_of("a").await, TeachState::Idle);
    }
}
