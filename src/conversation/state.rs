//! Teach-mode state machine
//!
//! Pure transition planning: given the current state and a normalized
//! utterance, decide what should happen and which state follows. Side
//! effects (storing, retraining, querying) are carried out by the engine,
//! which only commits the next state once they succeed.

use crate::config::TeachConfig;
use crate::memory::normalize;

/// Normalized keywords that drive transitions
#[derive(Debug, Clone, PartialEq)]
pub struct Keywords {
    toggle: String,
    affirmative: Vec<String>,
    negative: Vec<String>,
}

impl Keywords {
    pub fn new(toggle: &str, affirmative: &[String], negative: &[String]) -> Self {
        Self {
            toggle: normalize(toggle),
            affirmative: affirmative.iter().map(|s| normalize(s)).collect(),
            negative: negative.iter().map(|s| normalize(s)).collect(),
        }
    }

    pub fn from_config(config: &TeachConfig) -> Self {
        Self::new(&config.toggle_keyword, &config.affirmative, &config.negative)
    }

    pub fn toggle(&self) -> &str {
        &self.toggle
    }

    fn is_toggle(&self, utterance: &str) -> bool {
        utterance == self.toggle
    }

    fn is_affirmative(&self, utterance: &str) -> bool {
        self.affirmative.iter().any(|w| w == utterance)
    }

    fn is_negative(&self, utterance: &str) -> bool {
        self.negative.iter().any(|w| w == utterance)
    }
}

impl Default for Keywords {
    fn default() -> Self {
        Self::from_config(&TeachConfig::default())
    }
}

/// Where a conversation stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TeachState {
    /// Never toggled; behaves like `LearningOff`
    #[default]
    Idle,
    LearningOff,
    /// Teach mode on, next utterance is a new question
    AwaitingQuestion,
    /// Next utterance is an answer to `question`
    AwaitingAnswer { question: String },
    /// An answer was stored; waiting for yes/no on adding another
    AwaitingConfirmation { question: String },
}

/// What the engine has to do for an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ToggledOn,
    ToggledOff,
    /// Utterance became the pending question
    QuestionSet,
    /// Store the pair and retrain
    Record { question: String, answer: String },
    /// Teacher wants to add another answer
    AddAnother,
    /// Teacher is done with the question
    FinishQuestion,
    /// Neither yes nor no while confirming
    Reprompt,
    /// Normal read path
    Query,
}

/// Planned transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    pub next: TeachState,
}

impl TeachState {
    pub fn learning_mode(&self) -> bool {
        !matches!(self, TeachState::Idle | TeachState::LearningOff)
    }

    pub fn pending_question(&self) -> Option<&str> {
        match self {
            TeachState::AwaitingAnswer { question }
            | TeachState::AwaitingConfirmation { question } => Some(question),
            _ => None,
        }
    }

    pub fn awaiting_confirmation(&self) -> bool {
        matches!(self, TeachState::AwaitingConfirmation { .. })
    }

    /// Plan the transition for a normalized utterance
    pub fn plan(&self, utterance: &str, keywords: &Keywords) -> Step {
        if keywords.is_toggle(utterance) {
            return if self.learning_mode() {
                Step { action: Action::ToggledOff, next: TeachState::LearningOff }
            } else {
                Step { action: Action::ToggledOn, next: TeachState::AwaitingQuestion }
            };
        }

        match self {
            TeachState::Idle | TeachState::LearningOff => Step {
                action: Action::Query,
                next: self.clone(),
            },
            TeachState::AwaitingQuestion => Step {
                action: Action::QuestionSet,
                next: TeachState::AwaitingAnswer { question: utterance.to_string() },
            },
            TeachState::AwaitingAnswer { question } => Step {
                action: Action::Record {
                    question: question.clone(),
                    answer: utterance.to_string(),
                },
                next: TeachState::AwaitingConfirmation { question: question.clone() },
            },
            TeachState::AwaitingConfirmation { question } => {
                if keywords.is_affirmative(utterance) {
                    Step {
                        action: Action::AddAnother,
                        next: TeachState::AwaitingAnswer { question: question.clone() },
                    }
                } else if keywords.is_negative(utterance) {
                    Step { action: Action::FinishQuestion, next: TeachState::AwaitingQuestion }
                } else {
                    Step { action: Action::Reprompt, next: self.clone() }
                }
            }
        }
    }
}

impl std::fmt::Display for TeachState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeachState::Idle => write!(f, "idle"),
            TeachState::LearningOff => write!(f, "learning off"),
            TeachState::AwaitingQuestion => write!(f, "awaiting question"),
            TeachState::AwaitingAnswer { .. } => write!(f, "awaiting answer"),
            TeachState::AwaitingConfirmation { .. } => write!(f, "awaiting confirmation"),
        }
    }
}
