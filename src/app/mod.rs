//! Core application logic and orchestration
//!
//! [`App`] resolves credentials, builds the service clients for the selected
//! persona and drives a [`ChatSession`], either as an interactive REPL or for
//! a single question.

mod render;

pub use render::*;

use anyhow::{anyhow, Context, Result};
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::{
    chain::RequestChain,
    config::{Config, Persona},
    credentials::{AwsSession, ProcessEnv, SecretsManagerStore},
    llm::{GeneratorConfig, ProviderFactory},
    retrieval::{KnowledgeBaseRetriever, Passage},
    session::{ChatMessage, ChatSession, SessionError},
    speech::{create_synthesizer, resolve_api_key},
    utils::fs::{save_audio, write_file_safe},
};

/// Startup choices that come from the command line
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub persona: Option<String>,
    pub speech: bool,
}

/// Result of a one-shot question
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub reply: ChatMessage,
    pub context: Vec<Passage>,
    pub audio_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplAction {
    Continue,
    Quit,
}

/// Main application structure
pub struct App {
    config: Config,
    persona_name: String,
    persona: Persona,
    model: String,
    session: ChatSession,
}

impl App {
    /// Create a new application instance for one persona
    pub async fn new(config: Config, options: AppOptions) -> Result<Self> {
        let (persona_name, persona) = config.persona(options.persona.as_deref())?;
        let (persona_name, persona) = (persona_name.to_string(), persona.clone());
        debug!("Creating App for persona {}", persona_name);

        let template = persona.load_template(&persona_name, &config.prompts_dir).await?;

        let aws = AwsSession::from_process(config.credential_settings());
        let sdk_config = aws
            .sdk_config()
            .await
            .context("Failed to resolve AWS credentials")?
            .clone();
        if let Some(source) = aws.source() {
            info!("AWS credentials from {} in {}", source, aws.region());
        }

        let generator = ProviderFactory::create_generator(
            GeneratorConfig {
                model_id: config.model_id.clone(),
                api: config.model_api,
                sampling: config.sampling.clone(),
            },
            &sdk_config,
        )?;
        let model = generator.model().to_string();
        info!("Generating with {} model {}", generator.name(), model);

        let mut chain = RequestChain::new(template, generator)
            .with_system_message(persona.system_message.clone());

        match &persona.knowledge_base_id {
            Some(knowledge_base_id) => {
                chain = chain.with_retriever(Arc::new(KnowledgeBaseRetriever::from_config(
                    &sdk_config,
                    knowledge_base_id,
                    config.retrieval.number_of_results,
                )));
            }
            None => debug!("Persona {} has no knowledge base; retrieval skipped", persona_name),
        }

        if options.speech && config.speech.provider.is_enabled() {
            let voice_id = persona.voice_id.clone().ok_or_else(|| {
                anyhow!(
                    "persona '{}' has no voice_id but speech provider '{}' is configured",
                    persona_name,
                    config.speech.provider
                )
            })?;
            let store = SecretsManagerStore::with_config(&sdk_config);
            let api_key = resolve_api_key(&config.speech, &ProcessEnv, &store).await?;
            if let Some(synthesizer) = create_synthesizer(&config.speech, api_key)? {
                info!(
                    "Speech via {} with voice {}",
                    synthesizer.provider_name(),
                    voice_id
                );
                chain = chain.with_speech(synthesizer, voice_id);
            }
        }

        let session = ChatSession::new(persona_name.clone(), chain);
        Ok(Self::from_session(config, persona_name, persona, model, session))
    }

    /// Assemble an application around an existing session
    pub fn from_session(
        config: Config,
        persona_name: String,
        persona: Persona,
        model: String,
        session: ChatSession,
    ) -> Self {
        Self {
            config,
            persona_name,
            persona,
            model,
            session,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.persona.display_name
    }

    #[cfg(test)]
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Answer a single question. Audio goes to `audio_out` when given,
    /// otherwise into the configured audio directory.
    pub async fn ask(&mut self, prompt: &str, audio_out: Option<&Path>) -> Result<AskOutcome> {
        let turn = self.session.submit(prompt).await?;

        let audio_path = match (&turn.reply.audio, audio_out) {
            (Some(clip), Some(path)) => {
                write_file_safe(path, &clip.bytes)?;
                Some(path.to_path_buf())
            }
            (Some(_), None) => self.save_reply_audio(&turn.reply)?,
            (None, _) => None,
        };

        Ok(AskOutcome {
            reply: turn.reply,
            context: turn.context,
            audio_path,
        })
    }

    /// Run the chat REPL on stdin and stdout
    pub async fn run_interactive(&mut self) -> Result<()> {
        info!("Starting interactive chat as {}", self.persona_name);
        let mut renderer = Renderer::stdout();
        let input = BufReader::new(tokio::io::stdin());
        self.run_repl(input, &mut renderer).await?;
        info!("Chat finished: {:?}", self.session.stats());
        Ok(())
    }

    /// Read lines from `input` until end of input or `/quit`
    pub async fn run_repl<R, W>(&mut self, input: R, renderer: &mut Renderer<W>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        renderer.header(self.display_name(), &self.model, self.session.chain().speaks())?;
        if let Some(greeting) = self.persona.greeting.clone() {
            renderer.reply(self.display_name(), &greeting, None)?;
        }

        let mut lines = input.lines();
        loop {
            renderer.prompt()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if self.handle_line(line.trim(), renderer).await? == ReplAction::Quit {
                break;
            }
        }

        Ok(())
    }

    async fn handle_line<W: Write>(
        &mut self,
        line: &str,
        renderer: &mut Renderer<W>,
    ) -> Result<ReplAction> {
        match line {
            "" => {}
            "/quit" | "/exit" => return Ok(ReplAction::Quit),
            "/help" => renderer.help()?,
            "/reset" => {
                self.session.reset();
                renderer.info("Conversation cleared.")?;
            }
            "/speech" => {
                let chain = self.session.chain_mut();
                if chain.has_voice() {
                    let enabled = !chain.speaks();
                    chain.set_speech_enabled(enabled);
                    renderer.info(if enabled { "Speech on." } else { "Speech off." })?;
                } else {
                    renderer.error("no speech provider is configured for this persona")?;
                }
            }
            "/history" => {
                renderer.history(self.display_name(), self.session.history().messages())?;
                renderer.stats(&self.session.stats())?;
            }
            command if command.starts_with('/') => {
                renderer.error(&format!("unknown command {} (try /help)", command))?;
            }
            message => match self.session.submit(message).await {
                Ok(turn) => {
                    let audio_path = match self.save_reply_audio(&turn.reply) {
                        Ok(path) => path,
                        Err(e) => {
                            warn!("Could not save reply audio: {:#}", e);
                            renderer.error(&format!("{:#}", e))?;
                            None
                        }
                    };
                    renderer.reply(self.display_name(), &turn.reply.text, audio_path.as_deref())?;
                }
                Err(SessionError::EmptyMessage) => {}
                Err(e) => renderer.error(&e.to_string())?,
            },
        }

        Ok(ReplAction::Continue)
    }

    fn save_reply_audio(&self, reply: &ChatMessage) -> Result<Option<PathBuf>> {
        let Some(clip) = &reply.audio else {
            return Ok(None);
        };
        if clip.is_empty() {
            warn!("Speech provider returned no audio for message {}", reply.id);
            return Ok(None);
        }
        let path = save_audio(
            &self.config.audio_dir,
            &self.persona_name,
            &reply.id,
            reply.timestamp,
            clip,
        )?;
        debug!("Saved {} bytes of audio to {}", clip.len(), path.display());
        Ok(Some(path))
    }
}
