//! Application configuration
//!
//! Settings come from a YAML file with a handful of environment overrides.
//! Everything is read once at startup and never changes afterwards.

mod persona;

pub use persona::*;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

use crate::{
    chain::{PromptError, PromptTemplate},
    credentials::{CredentialSettings, EnvLookup, DEFAULT_CREDENTIALS_SECRET},
    llm::{ModelApi, SamplingParams},
    retrieval::DEFAULT_NUMBER_OF_RESULTS,
    speech::SpeechSettings,
};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-sonnet-20240229-v1:0";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No configuration file found (searched: {searched})")]
    NotFound { searched: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Unknown persona '{name}' (configured: {available})")]
    UnknownPersona { name: String, available: String },

    #[error("Prompt for persona '{persona}' is invalid: {source}")]
    Prompt {
        persona: String,
        #[source]
        source: PromptError,
    },

    #[error("Prompt file {} for persona '{persona}' could not be read: {source}", path.display())]
    PromptFile {
        persona: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Knowledge base retrieval settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Passages requested per question
    pub number_of_results: i32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            number_of_results: DEFAULT_NUMBER_OF_RESULTS,
        }
    }
}

/// Audio transcription settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// S3 bucket for media uploads and transcripts
    pub bucket: Option<String>,
    pub language_code: String,
    /// Job status polling interval, e.g. `10s`
    pub poll_interval: String,
    /// Give up waiting after this long, e.g. `30m`
    pub timeout: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            language_code: "en-US".to_string(),
            poll_interval: "10s".to_string(),
            timeout: None,
        }
    }
}

impl TranscriptionSettings {
    pub fn poll_interval(&self) -> ConfigResult<Duration> {
        parse_duration("transcription.poll_interval", &self.poll_interval)
    }

    pub fn timeout(&self) -> ConfigResult<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|timeout| parse_duration("transcription.timeout", timeout))
            .transpose()
    }
}

pub(crate) fn parse_duration(field: &str, value: &str) -> ConfigResult<Duration> {
    let duration = humantime::parse_duration(value)
        .map_err(|e| ConfigError::Invalid(format!("{} '{}': {}", field, value, e)))?;
    if duration.is_zero() {
        return Err(ConfigError::Invalid(format!("{} must be positive", field)));
    }
    Ok(duration)
}

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// AWS region for every service client
    pub region_name: Option<String>,

    /// Bedrock model identifier
    pub model_id: String,

    /// Request body format of the model
    pub model_api: ModelApi,

    /// Secrets Manager secret holding container credentials
    pub credentials_secret: String,

    pub sampling: SamplingParams,

    pub retrieval: RetrievalSettings,

    pub speech: SpeechSettings,

    /// Where synthesized replies are written
    pub audio_dir: PathBuf,

    /// Directory of `<prompt_id>.txt` prompt templates
    pub prompts_dir: PathBuf,

    /// Persona used when none is given on the command line
    pub default_persona: Option<String>,

    pub personas: BTreeMap<String, Persona>,

    pub transcription: TranscriptionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region_name: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            model_api: ModelApi::default(),
            credentials_secret: DEFAULT_CREDENTIALS_SECRET.to_string(),
            sampling: SamplingParams::default(),
            retrieval: RetrievalSettings::default(),
            speech: SpeechSettings::default(),
            audio_dir: PathBuf::from("./audio"),
            prompts_dir: PathBuf::from("./prompts"),
            default_persona: None,
            personas: BTreeMap::new(),
            transcription: TranscriptionSettings::default(),
        }
    }
}

impl Config {
    /// Locations searched when no path is given, in order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("config/config.yaml"),
            PathBuf::from("aime.yaml"),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("aime").join("config.yaml"));
        }
        paths
    }

    /// Load, apply environment overrides and validate
    pub async fn load(path: Option<&Path>, env: &dyn EnvLookup) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let candidates = Self::search_paths();
                candidates
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned()
                    .ok_or_else(|| ConfigError::NotFound {
                        searched: candidates
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })?
            }
        };

        let mut config = Self::load_from_file(&path).await?;
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but falls back to defaults when no path is
    /// given and no file exists in the search paths
    pub async fn load_or_default(path: Option<&Path>, env: &dyn EnvLookup) -> ConfigResult<Self> {
        match Self::load(path, env).await {
            Err(ConfigError::NotFound { .. }) => {
                debug!("No configuration file found, using defaults");
                let mut config = Self::default();
                config.apply_env(env);
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        debug!("Loading configuration from: {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Apply `AIME_*` overrides. `AWS_REGION` is used only when no region is
    /// configured at all.
    pub fn apply_env(&mut self, env: &dyn EnvLookup) {
        let var = |key: &str| env.var(key).filter(|value| !value.trim().is_empty());

        if let Some(region) = var("AIME_REGION") {
            self.region_name = Some(region);
        } else if self.region_name.is_none() {
            self.region_name = var("AWS_REGION");
        }

        if let Some(model_id) = var("AIME_MODEL_ID") {
            self.model_id = model_id;
        }

        if let Some(persona) = var("AIME_PERSONA") {
            self.default_persona = Some(persona);
        }

        if let Some(audio_dir) = var("AIME_AUDIO_DIR") {
            self.audio_dir = PathBuf::from(audio_dir);
        }
    }

    pub fn region(&self) -> &str {
        self.region_name.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn credential_settings(&self) -> CredentialSettings {
        CredentialSettings::new(self.credentials_secret.clone(), self.region())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.region().trim().is_empty() {
            return Err(ConfigError::Invalid("region_name is empty".to_string()));
        }

        if self.model_id.trim().is_empty() {
            return Err(ConfigError::Invalid("model_id is required".to_string()));
        }

        if self.credentials_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "credentials_secret is empty".to_string(),
            ));
        }

        self.sampling
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if !(1..=100).contains(&self.retrieval.number_of_results) {
            return Err(ConfigError::Invalid(
                "retrieval.number_of_results must be between 1 and 100".to_string(),
            ));
        }

        self.transcription.poll_interval()?;
        self.transcription.timeout()?;

        if let Some(name) = &self.default_persona {
            self.persona(Some(name.as_str()))?;
        }

        for (name, persona) in &self.personas {
            if persona.display_name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "persona '{}' has no display_name",
                    name
                )));
            }
            for (field, value) in [
                ("voice_id", &persona.voice_id),
                ("knowledge_base_id", &persona.knowledge_base_id),
                ("prompt_id", &persona.prompt_id),
            ] {
                if value.as_deref().is_some_and(|value| value.trim().is_empty()) {
                    return Err(ConfigError::Invalid(format!(
                        "persona '{}' has an empty {}",
                        name, field
                    )));
                }
            }
            if let Some(prompt) = &persona.prompt {
                PromptTemplate::parse(prompt).map_err(|source| {
                    ConfigError::Prompt {
                        persona: name.clone(),
                        source,
                    }
                })?;
            }
        }

        Ok(())
    }

    /// Pick a persona: the requested name, else the default, else the only
    /// configured one.
    pub fn persona<'a>(&'a self, name: Option<&'a str>) -> ConfigResult<(&'a str, &'a Persona)> {
        if self.personas.is_empty() {
            return Err(ConfigError::Invalid("no personas configured".to_string()));
        }

        let name = match name.or(self.default_persona.as_deref()) {
            Some(name) => name,
            None if self.personas.len() == 1 => {
                return self
                    .personas
                    .iter()
                    .next()
                    .map(|(name, persona)| (name.as_str(), persona))
                    .ok_or_else(|| ConfigError::Invalid("no personas configured".to_string()));
            }
            None => {
                return Err(ConfigError::Invalid(format!(
                    "several personas configured ({}); choose one with --persona or default_persona",
                    self.persona_names().join(", ")
                )))
            }
        };

        self.personas
            .get_key_value(name)
            .map(|(name, persona)| (name.as_str(), persona))
            .ok_or_else(|| ConfigError::UnknownPersona {
                name: name.to_string(),
                available: self.persona_names().join(", "),
            })
    }

    pub fn persona_names(&self) -> Vec<&str> {
        self.personas.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::SpeechProvider;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
region_name: us-west-2
model_id: anthropic.claude-v2:1
model_api: completion
sampling:
  max_tokens: 1024
speech:
  provider: elevenlabs
default_persona: airon
personas:
  airon:
    display_name: AIron
    prompt_id: airon
    voice_id: 21m00Tcm4TlvDq8ikWAM
    knowledge_base_id: KB123
    greeting: Hey! Ask me anything.
  drug:
    display_name: Drug AI
    prompt: "{context}\n{question}"
"#;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.region(), "us-west-2");
        assert_eq!(config.model_api, ModelApi::Completion);
        assert_eq!(config.sampling.max_tokens, 1024);
        assert_eq!(config.sampling.top_k, 250);
        assert_eq!(config.retrieval.number_of_results, 4);
        assert_eq!(config.speech.provider, SpeechProvider::ElevenLabs);
        assert_eq!(config.credentials_secret, "prod/ai-me/ecs_image");
        assert_eq!(config.personas.len(), 2);
        assert_eq!(
            config.personas["airon"].knowledge_base_id.as_deref(),
            Some("KB123")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.region(), DEFAULT_REGION);
        assert_eq!(config.transcription.language_code, "en-US");
        assert_eq!(
            config.transcription.poll_interval().unwrap(),
            Duration::from_secs(10)
        );
        assert_eq!(config.transcription.timeout().unwrap(), None);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.apply_env(&env(&[
            ("AIME_REGION", "eu-central-1"),
            ("AWS_REGION", "ap-south-1"),
            ("AIME_MODEL_ID", "anthropic.claude-3-haiku-20240307-v1:0"),
            ("AIME_PERSONA", "drug"),
            ("AIME_AUDIO_DIR", "/tmp/aime-audio"),
        ]));
        assert_eq!(config.region(), "eu-central-1");
        assert_eq!(config.model_id, "anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(config.default_persona.as_deref(), Some("drug"));
        assert_eq!(config.audio_dir, PathBuf::from("/tmp/aime-audio"));
    }

    #[test]
    fn test_aws_region_fallback() {
        let mut config = Config::default();
        config.apply_env(&env(&[("AWS_REGION", "ap-south-1")]));
        assert_eq!(config.region(), "ap-south-1");

        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.apply_env(&env(&[("AWS_REGION", "ap-south-1")]));
        assert_eq!(config.region(), "us-west-2");
    }

    #[test]
    fn test_persona_selection() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.persona(None).unwrap().0, "airon");
        assert_eq!(config.persona(Some("drug")).unwrap().1.display_name, "Drug AI");
        assert!(matches!(
            config.persona(Some("nobody")),
            Err(ConfigError::UnknownPersona { .. })
        ));

        config.default_persona = None;
        assert!(matches!(config.persona(None), Err(ConfigError::Invalid(_))));

        config.personas.remove("drug");
        assert_eq!(config.persona(None).unwrap().0, "airon");
    }

    #[test]
    fn test_validation_errors() {
        let base = Config::from_yaml(SAMPLE).unwrap();

        let mut config = base.clone();
        config.model_id = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = base.clone();
        config.sampling.temperature = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = base.clone();
        config.retrieval.number_of_results = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = base.clone();
        config.personas.clear();
        config.default_persona = None;
        config.validate().unwrap();
        assert!(matches!(config.persona(None), Err(ConfigError::Invalid(_))));

        let mut config = base.clone();
        config.default_persona = Some("ghost".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownPersona { .. })
        ));

        let mut config = base.clone();
        config.transcription.poll_interval = "soon".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = base;
        if let Some(persona) = config.personas.get_mut("drug") {
            persona.prompt = Some("{question} {topic}".to_string());
        }
        assert!(matches!(config.validate(), Err(ConfigError::Prompt { .. })));
    }

    #[test]
    fn test_blank_persona_ids_rejected() {
        let base = Config::from_yaml(SAMPLE).unwrap();

        let blank = |set: fn(&mut Persona)| {
            let mut config = base.clone();
            if let Some(persona) = config.personas.get_mut("airon") {
                set(persona);
            }
            config.validate()
        };

        let err = blank(|p| p.voice_id = Some(String::new())).unwrap_err();
        assert!(err.to_string().contains("empty voice_id"));

        let err = blank(|p| p.knowledge_base_id = Some("  ".to_string())).unwrap_err();
        assert!(err.to_string().contains("empty knowledge_base_id"));

        let err = blank(|p| p.prompt_id = Some(String::new())).unwrap_err();
        assert!(err.to_string().contains("empty prompt_id"));

        assert!(blank(|p| p.voice_id = None).is_ok());
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(Some(&path), &env(&[("AIME_PERSONA", "drug")]))
            .await
            .unwrap();
        assert_eq!(config.persona(None).unwrap().0, "drug");
    }

    #[tokio::test]
    async fn test_load_missing_and_malformed() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("missing.yaml");
        let err = Config::load(Some(&missing), &env(&[])).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let malformed = dir.path().join("bad.yaml");
        std::fs::write(&malformed, "personas: [unclosed").unwrap();
        let err = Config::load(Some(&malformed), &env(&[])).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
