//! Persistent question/answer memory
//!
//! Provides:
//! - SQLite-backed append-only store of taught (question, answer) pairs
//! - Multiple answers per question
//! - Exact lookup and distinct-question listing for the matcher and classifier

pub mod sqlite;

use serde::{Deserialize, Serialize};

pub use sqlite::QaStore;

/// A taught question and one of its answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    /// Normalized question text
    pub question: String,
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Normalize incoming text: lower-case and trim surrounding whitespace.
///
/// Accents and punctuation are kept as-is.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
