//! OpenAI speech synthesis

use async_openai::{
    config::OpenAIConfig,
    types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice},
    Client,
};
use async_trait::async_trait;
use tracing::info;

use crate::speech::{AudioClip, AudioFormat, SpeechError, SpeechResult, SpeechSynthesizer};

pub struct OpenAiSynthesizer {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    response_format: SpeechResponseFormat,
    format: AudioFormat,
}

impl OpenAiSynthesizer {
    pub fn new(api_key: String, base_url: Option<&str>) -> SpeechResult<Self> {
        if api_key.trim().is_empty() {
            return Err(SpeechError::Configuration(
                "OpenAI API key is empty".to_string(),
            ));
        }

        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = base_url {
            config = config.with_api_base(base_url);
        }

        Ok(Self {
            client: Client::with_config(config),
            model: SpeechModel::Tts1,
            response_format: SpeechResponseFormat::Mp3,
            format: AudioFormat::Mp3,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = match model {
            "tts-1" => SpeechModel::Tts1,
            "tts-1-hd" => SpeechModel::Tts1Hd,
            other => SpeechModel::Other(other.to_string()),
        };
        self
    }

    pub fn with_output_format(mut self, output_format: &str) -> SpeechResult<Self> {
        let (response_format, format) = match output_format.to_ascii_lowercase().as_str() {
            "mp3" => (SpeechResponseFormat::Mp3, AudioFormat::Mp3),
            "opus" => (SpeechResponseFormat::Opus, AudioFormat::Opus),
            "aac" => (SpeechResponseFormat::Aac, AudioFormat::Aac),
            "flac" => (SpeechResponseFormat::Flac, AudioFormat::Flac),
            other => {
                return Err(SpeechError::Configuration(format!(
                    "unsupported OpenAI speech format '{}'",
                    other
                )))
            }
        };
        self.response_format = response_format;
        self.format = format;
        Ok(self)
    }
}

/// Map a voice name onto the OpenAI voice set
pub fn parse_voice(voice_id: &str) -> SpeechResult<Voice> {
    match voice_id.trim().to_ascii_lowercase().as_str() {
        "alloy" => Ok(Voice::Alloy),
        "echo" => Ok(Voice::Echo),
        "fable" => Ok(Voice::Fable),
        "onyx" => Ok(Voice::Onyx),
        "nova" => Ok(Voice::Nova),
        "shimmer" => Ok(Voice::Shimmer),
        other => Err(SpeechError::InvalidInput(format!(
            "unknown OpenAI voice '{}' (expected alloy, echo, fable, onyx, nova or shimmer)",
            other
        ))),
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> SpeechResult<AudioClip> {
        if text.trim().is_empty() {
            return Err(SpeechError::InvalidInput("text is empty".to_string()));
        }
        let voice = parse_voice(voice_id)?;

        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .voice(voice)
            .model(self.model.clone())
            .response_format(self.response_format.clone())
            .build()
            .map_err(|e| SpeechError::InvalidInput(e.to_string()))?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| SpeechError::OpenAi(e.to_string()))?;

        info!(
            "OpenAI synthesized {} chars → {} bytes",
            text.len(),
            response.bytes.len()
        );

        Ok(AudioClip::new(response.bytes.to_vec(), self.format))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
