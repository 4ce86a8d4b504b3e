//! Integration tests for the teach-mode conversation flow:
//! - Toggle on/off and state cleanup
//! - Question / answer / confirmation cycle with multiple answers
//! - Case-insensitive retrieval and random choice among answers

use std::collections::HashSet;
use teachbot::config::Replies;
use teachbot::{EngineSettings, InboundMessage, QaStore, ResponseEngine, TeachState};

const TOGGLE: &str = "stnelly141";

async fn engine() -> ResponseEngine {
    let store = QaStore::open_in_memory().unwrap();
    ResponseEngine::new(store, EngineSettings::default()).await.unwrap()
}

async fn say(engine: &ResponseEngine, conversation: &str, text: &str) -> String {
    engine
        .handle(&InboundMessage::new(conversation, text))
        .await
        .unwrap()
        .text
}

async fn teach(engine: &ResponseEngine, question: &str, answers: &[&str]) {
    say(engine, "teacher", TOGGLE).await;
    say(engine, "teacher", question).await;
    for (i, answer) in answers.iter().enumerate() {
        if i > 0 {
            say(engine, "teacher", "sí").await;
        }
        say(engine, "teacher", answer).await;
    }
    say(engine, "teacher", "no").await;
    say(engine, "teacher", TOGGLE).await;
}

#[tokio::test]
async fn test_confirmation_cycle_records_every_answer() {
    let engine = engine().await;
    let replies = Replies::default();

    assert_eq!(say(&engine, "t", TOGGLE).await, replies.learning_on);
    assert_eq!(say(&engine, "t", "what is 2+2?").await, replies.ask_answer);
    assert_eq!(say(&engine, "t", "four").await, replies.answer_saved);
    assert_eq!(say(&engine, "t", "sí").await, replies.ask_next_answer);
    assert_eq!(say(&engine, "t", "five").await, replies.answer_saved);
    say(&engine, "t", "no").await;

    let answers: HashSet<String> = engine.lookup_exact("what is 2+2?").await.unwrap().into_iter().collect();
    assert_eq!(answers, HashSet::from(["four".to_string(), "five".to_string()]));

    let state = engine.state_of("t").await;
    assert!(state.pending_question().is_none());
    assert!(!state.awaiting_confirmation());
    assert_eq!(state, TeachState::AwaitingQuestion);
}

#[tokio::test]
async fn test_double_toggle_restores_mode_without_pending_question() {
    let engine = engine().await;
    let before = engine.state_of("t").await;
    assert!(!before.learning_mode());

    say(&engine, "t", TOGGLE).await;
    say(&engine, "t", "a question left hanging").await;
    assert_eq!(engine.state_of("t").await.pending_question(), Some("a question left hanging"));

    say(&engine, "t", TOGGLE).await;
    let after = engine.state_of("t").await;
    assert!(!after.learning_mode());
    assert!(after.pending_question().is_none());

    // A fresh activation starts from a new question
    say(&engine, "t", TOGGLE).await;
    assert_eq!(engine.state_of("t").await, TeachState::AwaitingQuestion);
}

#[tokio::test]
async fn test_toggle_is_case_insensitive() {
    let engine = engine().await;
    assert_eq!(say(&engine, "t", "STNELLY141").await, Replies::default().learning_on);
}

#[tokio::test]
async fn test_round_trip_outside_learning_mode() {
    let engine = engine().await;
    teach(&engine, "cuál es tu nombre", &["me llamo bot"]).await;

    assert_eq!(say(&engine, "someone", "cuál es tu nombre").await, "me llamo bot");
}

#[tokio::test]
async fn test_case_normalization() {
    let engine = engine().await;
    teach(&engine, "hello", &["hi"]).await;

    assert_eq!(say(&engine, "u", "Hello").await, "hi");
    assert_eq!(say(&engine, "u", "hello").await, "hi");
}

#[tokio::test]
async fn test_answers_are_stored_lower_cased() {
    let engine = engine().await;
    teach(&engine, "Ping", &["PONG"]).await;
    assert_eq!(engine.lookup_exact("ping").await.unwrap(), vec!["pong"]);
}

#[tokio::test]
async fn test_multi_answer_fairness() {
    let engine = engine().await;
    teach(&engine, "tell me a color", &["red", "green", "blue"]).await;

    let mut seen = HashSet::new();
    for _ in 0..300 {
        seen.insert(say(&engine, "u", "tell me a color").await);
    }
    assert_eq!(
        seen,
        HashSet::from(["red".to_string(), "green".to_string(), "blue".to_string()])
    );
}

#[tokio::test]
async fn test_unrecognized_confirmation_reprompts_and_keeps_question() {
    let engine = engine().await;
    say(&engine, "t", TOGGLE).await;
    say(&engine, "t", "q").await;
    say(&engine, "t", "a").await;

    assert_eq!(say(&engine, "t", "quizás").await, Replies::default().confirm_reprompt);
    let state = engine.state_of("t").await;
    assert!(state.awaiting_confirmation());
    assert_eq!(state.pending_question(), Some("q"));

    // Nothing extra was stored
    assert_eq!(engine.lookup_exact("q").await.unwrap(), vec!["a"]);
}

#[tokio::test]
async fn test_teach_mode_is_per_conversation() {
    let engine = engine().await;
    say(&engine, "teacher", TOGGLE).await;
    say(&engine, "teacher", "hola").await;

    // Another chat is still querying while the teacher is mid-question
    let reply = say(&engine, "visitor", "hola").await;
    assert_eq!(reply, Replies::default().insufficient_data);
    assert!(engine.lookup_exact("hola").await.unwrap().is_empty());

    say(&engine, "teacher", "buenas").await;
    assert_eq!(say(&engine, "visitor", "hola").await, "buenas");
}

#[tokio::test]
async fn test_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("bot_memory.db");
    let model = dir.path().join("classifier.json");
    let settings = EngineSettings {
        model_path: Some(model.clone()),
        ..EngineSettings::default()
    };

    {
        let store = QaStore::open(&db).await.unwrap();
        let engine = ResponseEngine::new(store, settings.clone()).await.unwrap();
        teach(&engine, "buenos dias", &["buen dia para ti"]).await;
    }

    let store = QaStore::open(&db).await.unwrap();
    let engine = ResponseEngine::new(store, settings).await.unwrap();
    assert_eq!(say(&engine, "u", "Buenos días").await, "buen dia para ti");
    assert_eq!(engine.stats().await.unwrap().classifier.unwrap().trained_on, 1);
}
