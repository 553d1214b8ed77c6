//! ElevenLabs text-to-speech over REST

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::speech::{AudioClip, AudioFormat, SpeechError, SpeechResult, SpeechSynthesizer};

pub const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";
pub const DEFAULT_MODEL: &str = "eleven_multilingual_v2";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_22050_32";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.0,
            similarity_boost: 1.0,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

pub struct ElevenLabsSynthesizer {
    client: Client,
    api_key: String,
    base_url: String,
    model_id: String,
    output_format: String,
    format: AudioFormat,
    voice_settings: VoiceSettings,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: String) -> SpeechResult<Self> {
        if api_key.trim().is_empty() {
            return Err(SpeechError::Configuration(
                "ElevenLabs API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: ELEVENLABS_API_BASE.to_string(),
            model_id: DEFAULT_MODEL.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            format: AudioFormat::Mp3,
            voice_settings: VoiceSettings::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model_id: &str) -> Self {
        self.model_id = model_id.to_string();
        self
    }

    pub fn with_output_format(mut self, output_format: &str) -> SpeechResult<Self> {
        self.format = AudioFormat::from_output_format(output_format).ok_or_else(|| {
            SpeechError::Configuration(format!(
                "unsupported ElevenLabs output format '{}'",
                output_format
            ))
        })?;
        self.output_format = output_format.to_string();
        Ok(self)
    }

    /// Endpoint for one synthesis call
    pub fn request_url(&self, voice_id: &str) -> SpeechResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SpeechError::Configuration(format!("invalid base URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| {
                SpeechError::Configuration(format!("base URL '{}' cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["v1", "text-to-speech", voice_id]);

        url.query_pairs_mut()
            .append_pair("optimize_streaming_latency", "0")
            .append_pair("output_format", &self.output_format);

        Ok(url)
    }

    fn request_body<'a>(&'a self, text: &'a str) -> SynthesisRequest<'a> {
        SynthesisRequest {
            text,
            model_id: &self.model_id,
            voice_settings: self.voice_settings,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> SpeechResult<AudioClip> {
        if text.trim().is_empty() {
            return Err(SpeechError::InvalidInput("text is empty".to_string()));
        }
        if voice_id.trim().is_empty() {
            return Err(SpeechError::InvalidInput("voice id is empty".to_string()));
        }

        let url = self.request_url(voice_id)?;
        let response = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", self.format.mime_type())
            .json(&self.request_body(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api { status, message });
        }

        let bytes = response.bytes().await?;
        info!(
            "ElevenLabs synthesized {} chars → {} bytes",
            text.len(),
            bytes.len()
        );

        Ok(AudioClip::new(bytes.to_vec(), self.format))
    }

    fn provider_name(&self) -> &str {
        "elevenlabs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn synthesizer() -> ElevenLabsSynthesizer {
        ElevenLabsSynthesizer::new("test-key".to_string()).unwrap()
    }

    #[test]
    fn test_request_url() {
        let url = synthesizer().request_url("voice123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.elevenlabs.io/v1/text-to-speech/voice123?optimize_streaming_latency=0&output_format=mp3_22050_32"
        );
    }

    #[test]
    fn test_request_url_with_custom_base() {
        let url = synthesizer()
            .with_base_url("http://localhost:8080/proxy/")
            .request_url("v")
            .unwrap();
        assert_eq!(url.path(), "/proxy/v1/text-to-speech/v");
    }

    #[test]
    fn test_request_body() {
        let synthesizer = synthesizer();
        let body = serde_json::to_value(synthesizer.request_body("Hello there")).unwrap();
        assert_eq!(
            body,
            json!({
                "text": "Hello there",
                "model_id": "eleven_multilingual_v2",
                "voice_settings": {
                    "stability": 0.0,
                    "similarity_boost": 1.0,
                    "style": 0.0,
                    "use_speaker_boost": true
                }
            })
        );
    }

    #[test]
    fn test_output_format() {
        let synthesizer = synthesizer().with_output_format("pcm_16000").unwrap();
        assert_eq!(synthesizer.format, AudioFormat::Pcm);
        assert!(super::ElevenLabsSynthesizer::new("k".to_string())
            .unwrap()
            .with_output_format("ulaw_8000")
            .is_err());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(matches!(
            ElevenLabsSynthesizer::new("  ".to_string()),
            Err(SpeechError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let err = synthesizer().synthesize("   ", "voice").await.unwrap_err();
        assert!(matches!(err, SpeechError::InvalidInput(_)));

        let err = synthesizer().synthesize("hi", "").await.unwrap_err();
        assert!(matches!(err, SpeechError::InvalidInput(_)));
    }
}
