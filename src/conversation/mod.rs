//! Conversation handling
//!
//! Teach mode lets a teacher record question/answer pairs from chat:
//! toggle keyword, question, answer, then "sí" for another answer or "no"
//! to finish. Outside teach mode every utterance is a query.
//!
//! Teach mode is tracked per conversation.

pub mod engine;
pub mod state;

pub use engine::{EngineSettings, EngineStats, ResponseEngine};
pub use state::{Action, Keywords, Step, TeachState};
