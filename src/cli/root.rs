use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use super::{
    ask::AskCommand,
    chat::ChatCommand,
    personas::PersonasCommand,
    schema::SchemaCommand,
    transcribe::{TranscribeCommand, TranscriptCommand},
};
use crate::{config::Config, credentials::ProcessEnv};

/// aime - chat with a persona backed by a knowledge base, an LLM and a voice
#[derive(Parser)]
#[command(
    name = "aime",
    version,
    about = "Chat with a persona backed by a knowledge base, an LLM and a voice",
    long_about = r#"aime answers questions in the voice of a configured persona. Each turn retrieves
passages from a Bedrock knowledge base, fills the persona's prompt, asks the model
and, when a speech provider is configured, speaks the reply.

Examples:
  aime                                  # Chat with the default persona
  aime --persona airon chat             # Chat with a specific persona
  aime ask "what's new this week?"      # Ask a single question
  aime transcribe talk.mp3 --bucket b --client-name sat"#
)]
pub struct Cli {
    /// Configuration file (defaults to config/config.yaml, ./aime.yaml or the user config dir)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Persona to use
    #[arg(short = 'p', long = "persona", global = true)]
    pub persona: Option<String>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat(ChatCommand),
    /// Ask a single question non-interactively
    Ask(AskCommand),
    /// List configured personas
    Personas(PersonasCommand),
    /// Print or check the configuration schema
    Schema(SchemaCommand),
    /// Transcribe a media file with Amazon Transcribe
    Transcribe(TranscribeCommand),
    /// Convert a Transcribe result document to plain text
    Transcript(TranscriptCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        if self.debug {
            debug!("Debug logging enabled");
        }

        let persona = self.persona.clone();
        let config_path = self.config.clone();

        match self.command {
            Some(Commands::Schema(cmd)) => cmd.execute().await,
            Some(Commands::Transcribe(cmd)) => {
                let config = Config::load_or_default(config_path.as_deref(), &ProcessEnv).await?;
                cmd.execute(&config).await
            }
            Some(Commands::Transcript(cmd)) => {
                let config = Config::load_or_default(config_path.as_deref(), &ProcessEnv).await?;
                cmd.execute(&config).await
            }
            Some(Commands::Personas(cmd)) => {
                let config = Config::load(config_path.as_deref(), &ProcessEnv).await?;
                cmd.execute(&config, persona.as_deref())
            }
            Some(Commands::Ask(cmd)) => {
                let config = Config::load(config_path.as_deref(), &ProcessEnv).await?;
                cmd.execute(config, persona).await
            }
            Some(Commands::Chat(cmd)) => {
                let config = Config::load(config_path.as_deref(), &ProcessEnv).await?;
                cmd.execute(config, persona).await
            }
            None => {
                let config = Config::load(config_path.as_deref(), &ProcessEnv).await?;
                ChatCommand::default().execute(config, persona).await
            }
        }
    }
}
