//! The per-turn request chain: retrieve, fill the prompt, generate, speak
//!
//! Every step runs in order and any failure aborts the turn. The reply text
//! is passed through exactly as the model returned it.

pub mod prompt;

pub use prompt::*;

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    llm::{GenerationRequest, LlmError, TextGenerator},
    retrieval::{format_context, Passage, RetrievalError, Retriever},
    session::{render_transcript, ChatMessage},
    speech::{AudioClip, SpeechError, SpeechSynthesizer},
};

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Speech synthesis failed: {0}")]
    Speech(#[from] SpeechError),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Result of one successful turn
#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub text: String,
    pub context: Vec<Passage>,
    pub audio: Option<AudioClip>,
}

struct Voice {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice_id: String,
}

/// Retrieval, generation and optional speech bound to one persona
pub struct RequestChain {
    template: PromptTemplate,
    generator: Arc<dyn TextGenerator>,
    retriever: Option<Arc<dyn Retriever>>,
    voice: Option<Voice>,
    system_message: Option<String>,
    speech_enabled: bool,
}

impl RequestChain {
    pub fn new(template: PromptTemplate, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            template,
            generator,
            retriever: None,
            voice: None,
            system_message: None,
            speech_enabled: true,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_speech(
        mut self,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voice_id: impl Into<String>,
    ) -> Self {
        self.voice = Some(Voice {
            synthesizer,
            voice_id: voice_id.into(),
        });
        self
    }

    pub fn with_system_message(mut self, system_message: Option<String>) -> Self {
        self.system_message = system_message;
        self
    }

    /// Turn speech on or off without dropping the configured voice
    pub fn set_speech_enabled(&mut self, enabled: bool) {
        self.speech_enabled = enabled;
    }

    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    pub fn speaks(&self) -> bool {
        self.speech_enabled && self.has_voice()
    }

    /// Fill the template for `question` given retrieved passages and the
    /// messages that came before it
    pub fn build_prompt(
        &self,
        question: &str,
        context: &[Passage],
        history: &[ChatMessage],
    ) -> String {
        let context = format_context(context);
        let history = render_transcript(history);
        self.template.render(&PromptVars {
            context: &context,
            history: &history,
            question,
        })
    }

    pub async fn run(&self, question: &str, history: &[ChatMessage]) -> ChainResult<ChainOutput> {
        let context = match &self.retriever {
            Some(retriever) => {
                let passages = retriever.retrieve(question).await?;
                debug!("Retrieved {} passages from {}", passages.len(), retriever.name());
                passages
            }
            None => Vec::new(),
        };

        let prompt = self.build_prompt(question, &context, history);
        let request = GenerationRequest::new(prompt).with_system_message(self.system_message.clone());
        let generation = self.generator.generate(request).await?;

        let audio = match &self.voice {
            Some(_) if generation.text.trim().is_empty() => {
                debug!("Blank reply; nothing to speak");
                None
            }
            Some(voice) if self.speech_enabled => Some(
                voice
                    .synthesizer
                    .synthesize(&generation.text, &voice.voice_id)
                    .await?,
            ),
            _ => None,
        };

        info!(
            "Turn complete: {} chars of reply, {} passages, audio: {}",
            generation.text.len(),
            context.len(),
            audio.is_some()
        );

        Ok(ChainOutput {
            text: generation.text,
            context,
            audio,
        })
    }
}
