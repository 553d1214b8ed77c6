//! Text-to-speech for assistant replies
//!
//! A [`SpeechSynthesizer`] turns reply text into an [`AudioClip`] using a
//! persona's voice. ElevenLabs is reached over plain HTTP; OpenAI speech goes
//! through `async-openai`. API keys come from an environment variable or a
//! JSON secret.

pub mod elevenlabs;
pub mod openai;

pub use elevenlabs::ElevenLabsSynthesizer;
pub use openai::OpenAiSynthesizer;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::credentials::{get_secret_string, CredentialError, EnvLookup, SecretStore};

/// Default secret holding the ElevenLabs API key
pub const DEFAULT_ELEVENLABS_SECRET: &str = "prod/aime/elevenlabs";

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech configuration error: {0}")]
    Configuration(String),

    #[error("Invalid speech input: {0}")]
    InvalidInput(String),

    #[error("Speech API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Speech request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI speech request failed: {0}")]
    OpenAi(String),

    #[error("Speech API key lookup failed: {0}")]
    Credential(#[from] CredentialError),
}

pub type SpeechResult<T> = Result<T, SpeechError>;

/// Encoded audio format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Opus => "audio/opus",
            Self::Aac => "audio/aac",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
            Self::Pcm => "audio/L16",
        }
    }

    /// Format named by a provider output string such as `mp3_22050_32`
    pub fn from_output_format(output_format: &str) -> Option<Self> {
        let codec = output_format
            .split('_')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match codec.as_str() {
            "mp3" => Some(Self::Mp3),
            "opus" => Some(Self::Opus),
            "aac" => Some(Self::Aac),
            "flac" => Some(Self::Flac),
            "wav" => Some(Self::Wav),
            "pcm" => Some(Self::Pcm),
            _ => None,
        }
    }
}

/// Synthesized speech
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, format: AudioFormat) -> Self {
        Self { bytes, format }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Trait for text-to-speech backends
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the provider-specific `voice_id`
    async fn synthesize(&self, text: &str, voice_id: &str) -> SpeechResult<AudioClip>;

    fn provider_name(&self) -> &str;
}

/// Which speech backend replies are voiced with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProvider {
    /// Replies are text only
    #[default]
    None,
    #[serde(alias = "eleven_labs")]
    ElevenLabs,
    #[serde(alias = "open_ai")]
    OpenAi,
}

impl SpeechProvider {
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }

    fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::ElevenLabs => Some("ELEVENLABS_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
        }
    }

    fn default_api_key_secret(self) -> Option<SecretRef> {
        match self {
            Self::ElevenLabs => Some(SecretRef {
                secret_id: DEFAULT_ELEVENLABS_SECRET.to_string(),
                key: "api_key".to_string(),
            }),
            Self::None | Self::OpenAi => None,
        }
    }
}

impl std::fmt::Display for SpeechProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ElevenLabs => write!(f, "elevenlabs"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// A string field inside a JSON secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretRef {
    pub secret_id: String,
    #[serde(default = "default_secret_key")]
    pub key: String,
}

fn default_secret_key() -> String {
    "api_key".to_string()
}

/// Speech section of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SpeechSettings {
    pub provider: SpeechProvider,
    /// Provider model, e.g. `eleven_multilingual_v2` or `tts-1`
    pub model_id: Option<String>,
    /// Provider output format, e.g. `mp3_22050_32`
    pub output_format: Option<String>,
    /// Override for the provider API endpoint
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// JSON secret holding the API key
    pub api_key_secret: Option<SecretRef>,
}

impl SpeechSettings {
    pub fn api_key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.provider.default_api_key_env())
    }

    pub fn api_key_secret(&self) -> Option<SecretRef> {
        self.api_key_secret
            .clone()
            .or_else(|| self.provider.default_api_key_secret())
    }
}

/// Find the provider API key: the configured environment variable first,
/// then the configured secret.
pub async fn resolve_api_key(
    settings: &SpeechSettings,
    env: &dyn EnvLookup,
    store: &dyn SecretStore,
) -> SpeechResult<String> {
    if let Some(var) = settings.api_key_env() {
        if let Some(key) = env.var(var).filter(|key| !key.trim().is_empty()) {
            debug!("Using {} API key from {}", settings.provider, var);
            return Ok(key);
        }
    }

    if let Some(secret) = settings.api_key_secret() {
        let key = get_secret_string(store, &secret.secret_id, &secret.key).await?;
        if key.trim().is_empty() {
            return Err(SpeechError::Configuration(format!(
                "secret '{}' holds an empty '{}'",
                secret.secret_id, secret.key
            )));
        }
        debug!(
            "Using {} API key from secret {}",
            settings.provider, secret.secret_id
        );
        return Ok(key);
    }

    Err(SpeechError::Configuration(format!(
        "no API key source configured for speech provider '{}'",
        settings.provider
    )))
}

/// Build the configured synthesizer. Returns `None` when speech is disabled.
pub fn create_synthesizer(
    settings: &SpeechSettings,
    api_key: String,
) -> SpeechResult<Option<Arc<dyn SpeechSynthesizer>>> {
    let synthesizer: Arc<dyn SpeechSynthesizer> = match settings.provider {
        SpeechProvider::None => return Ok(None),
        SpeechProvider::ElevenLabs => {
            let mut synthesizer = ElevenLabsSynthesizer::new(api_key)?;
            if let Some(base_url) = &settings.base_url {
                synthesizer = synthesizer.with_base_url(base_url);
            }
            if let Some(model_id) = &settings.model_id {
                synthesizer = synthesizer.with_model(model_id);
            }
            if let Some(output_format) = &settings.output_format {
                synthesizer = synthesizer.with_output_format(output_format)?;
            }
            Arc::new(synthesizer)
        }
        SpeechProvider::OpenAi => {
            let mut synthesizer = OpenAiSynthesizer::new(api_key, settings.base_url.as_deref())?;
            if let Some(model_id) = &settings.model_id {
                synthesizer = synthesizer.with_model(model_id);
            }
            if let Some(output_format) = &settings.output_format {
                synthesizer = synthesizer.with_output_format(output_format)?;
            }
            Arc::new(synthesizer)
        }
    };

    Ok(Some(synthesizer))
}
