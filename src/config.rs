//! Configuration management
//!
//! Manages bot configuration: Telegram access, teach-mode keywords, match
//! threshold, storage locations and reply texts. Values come from
//! `config.toml`, then `.env`/environment overrides.

use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramSettings,
    /// Teach-mode keywords
    #[serde(default)]
    pub teach: TeachConfig,
    /// Approximate matching
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Store and model locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// User-visible reply texts
    #[serde(default)]
    pub replies: Replies,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot token is read from the environment, never written to disk
    #[serde(skip)]
    pub bot_token: Option<String>,
    /// API base URL (for self-hosted bot API servers)
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Long-polling timeout for getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachConfig {
    /// Phrase that flips teach mode on and off
    #[serde(default = "default_toggle_keyword")]
    pub toggle_keyword: String,
    /// Replies accepted as "yes, add another answer"
    #[serde(default = "default_affirmative")]
    pub affirmative: Vec<String>,
    /// Replies accepted as "no, this question is done"
    #[serde(default = "default_negative")]
    pub negative: Vec<String>,
}

fn default_toggle_keyword() -> String {
    "stnelly141".to_string()
}

fn default_affirmative() -> Vec<String> {
    vec!["sí".to_string(), "si".to_string()]
}

fn default_negative() -> Vec<String> {
    vec!["no".to_string()]
}

impl Default for TeachConfig {
    fn default() -> Self {
        Self {
            toggle_keyword: default_toggle_keyword(),
            affirmative: default_affirmative(),
            negative: default_negative(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum similarity (0-100, exclusive) for a stored question to match
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    80.0
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database with taught responses
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Cached classifier artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Cache the classifier between runs
    #[serde(default = "default_true")]
    pub persist_model: bool,
}

fn default_database_path() -> PathBuf {
    data_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("bot_memory.db")
}

fn default_model_path() -> PathBuf {
    data_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("classifier.json")
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            model_path: default_model_path(),
            persist_model: true,
        }
    }
}

/// Every reply the bot can send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Replies {
    pub learning_on: String,
    pub learning_off: String,
    pub ask_answer: String,
    pub answer_saved: String,
    pub ask_next_answer: String,
    /// `{keyword}` is replaced by the toggle keyword
    pub question_finished: String,
    pub confirm_reprompt: String,
    pub did_not_understand: String,
    pub insufficient_data: String,
    pub storage_failure: String,
    pub lookup_failure: String,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            learning_on: "Modo aprendizaje activado.".to_string(),
            learning_off: "Modo aprendizaje desactivado.".to_string(),
            ask_answer: "¿Cómo debería responder a esto?".to_string(),
            answer_saved: "Respuesta guardada. ¿Quieres agregar otra respuesta para la misma pregunta? (sí/no)".to_string(),
            ask_next_answer: "Ingresa la siguiente respuesta para la pregunta.".to_string(),
            question_finished: "Pregunta finalizada. Ingresa una nueva pregunta o usa '{keyword}' para salir del modo aprendizaje.".to_string(),
            confirm_reprompt: "Responde 'sí' para agregar otra respuesta o 'no' para terminar.".to_string(),
            did_not_understand: "No te entendí bb.".to_string(),
            insufficient_data: "Todavía no tengo suficientes datos para responder.".to_string(),
            storage_failure: "No pude guardar eso, inténtalo de nuevo.".to_string(),
            lookup_failure: "Ahora mismo no puedo responder, inténtalo más tarde.".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        let mut config = if config_path.exists() {
            Self::read(&config_path)?
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            config
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        Ok(config)
    }

    /// Write configuration to `path`; the bot token is never written
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN").or_else(|| lookup("TELEGRAM_BOT_TOKEN")) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(keyword) = lookup("TEACHBOT_TOGGLE_KEYWORD") {
            self.teach.toggle_keyword = keyword;
        }
        if let Some(threshold) = lookup("TEACHBOT_MATCH_THRESHOLD") {
            self.matching.threshold = threshold.trim().parse()
                .with_context(|| format!("Invalid TEACHBOT_MATCH_THRESHOLD '{}'", threshold))?;
        }
        if let Some(path) = lookup("TEACHBOT_DATABASE") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("TEACHBOT_MODEL") {
            self.storage.model_path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.matching.threshold) {
            anyhow::bail!("Match threshold must be within 0-100, got {}", self.matching.threshold);
        }
        if crate::memory::normalize(&self.teach.toggle_keyword).is_empty() {
            anyhow::bail!("Toggle keyword must not be empty");
        }
        if self.teach.affirmative.is_empty() || self.teach.negative.is_empty() {
            anyhow::bail!("Affirmative and negative reply lists must not be empty");
        }
        Ok(())
    }

    /// Model artifact path, if caching is enabled
    pub fn model_path(&self) -> Option<&Path> {
        self.storage.persist_model.then_some(self.storage.model_path.as_path())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "teachbot", "teachbot")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "teachbot", "teachbot")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Configuration as TOML, for display
pub fn to_toml(config: &Config) -> String {
    toml::to_string_pretty(config).unwrap_or_else(|_| "# Unable to render configuration\n".to_string())
}
