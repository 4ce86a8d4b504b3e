//! CLI interface for teachbot

use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::conversation::{EngineSettings, ResponseEngine};
use crate::gateway::Gateway;
use crate::memory::{normalize, QaStore};
use crate::messaging::{ConsoleChannel, TelegramClient, TelegramConfig};

#[derive(Parser)]
#[command(name = "teachbot")]
#[command(about = "Teachable chat bot with fuzzy matching and a statistical fallback", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "TEACHBOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot (long polling)
    Run,
    /// Talk to the bot from the terminal
    Chat {
        /// Use a throwaway in-memory store
        #[arg(long)]
        ephemeral: bool,
    },
    /// Answer a single query and exit
    Ask {
        /// Query text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Retrain the fallback classifier from the store
    Retrain,
    /// Show store and classifier statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the default configuration file path
    Path,
}

/// Run CLI
pub async fn run() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    if let Commands::Config { command: ConfigCommands::Path } = cli.command {
        println!("{}", config::config_path()?.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run => run_telegram(&config).await?,
        Commands::Chat { ephemeral } => run_console(&config, ephemeral).await?,
        Commands::Ask { text } => {
            let engine = ResponseEngine::open(&config).await?;
            let query = normalize(&text.join(" "));
            println!("{}", engine.respond(&query).await?);
        }
        Commands::Retrain => {
            let engine = ResponseEngine::open(&config).await?;
            if engine.retrain().await? {
                let stats = engine.stats().await?;
                println!("Classifier retrained on {} responses.", stats.rows);
            } else {
                println!("Nothing to train on yet: teach the bot some responses first.");
            }
        }
        Commands::Stats { json } => {
            let engine = ResponseEngine::open(&config).await?;
            let stats = engine.stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Store:        {}", config.storage.database_path.display());
                println!("Responses:    {}", stats.rows);
                println!("Questions:    {}", stats.distinct_questions);
                match &stats.classifier {
                    Some(c) => println!(
                        "Classifier:   {} answers, {} terms, trained on {} rows at {}",
                        c.classes,
                        c.vocab_size,
                        c.trained_on,
                        c.trained_at.format("%Y-%m-%d %H:%M UTC")
                    ),
                    None => println!("Classifier:   untrained"),
                }
            }
        }
        Commands::Config { command: ConfigCommands::Show } => {
            print!("{}", config::to_toml(&config));
        }
        Commands::Config { command: ConfigCommands::Path } => {
            println!("{}", config::config_path()?.display());
        }
    }

    Ok(())
}

async fn run_telegram(config: &Config) -> Result<()> {
    let client = TelegramClient::new(TelegramConfig::from_config(config)?)?;
    let me = client.get_me().await.context("Telegram rejected the bot token")?;
    info!("Connected to Telegram as @{}", me.username.as_deref().unwrap_or(&me.first_name));

    let engine = Arc::new(ResponseEngine::open(config).await?);
    info!("Bot running...");
    Gateway::new(engine, Arc::new(client)).run().await?;
    Ok(())
}

async fn run_console(config: &Config, ephemeral: bool) -> Result<()> {
    let engine = if ephemeral {
        let settings = EngineSettings {
            model_path: None,
            ..EngineSettings::from_config(config)
        };
        ResponseEngine::new(QaStore::open_in_memory()?, settings).await?
    } else {
        ResponseEngine::open(config).await?
    };

    println!("Type a message, Ctrl-D to quit.");
    Gateway::new(Arc::new(engine), Arc::new(ConsoleChannel::stdio())).run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["teachbot", "ask", "hola", "que", "tal"]).unwrap();
        match cli.command {
            Commands::Ask { text } => assert_eq!(text.join(" "), "hola que tal"),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_parse_global_config() {
        let cli = Cli::try_parse_from(["teachbot", "chat", "--ephemeral", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(cli.command, Commands::Chat { ephemeral: true }));
    }
}
