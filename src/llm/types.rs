//! Common types for text generation

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::llm::errors::{LlmError, LlmResult};

/// Request body format understood by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModelApi {
    /// Anthropic Messages API (Claude 2.1 and later, Claude 3)
    #[default]
    Messages,
    /// Legacy `\n\nHuman:` / `\n\nAssistant:` text completion
    Completion,
}

/// Sampling parameters sent with every generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.0,
            top_k: 250,
            top_p: 1.0,
            stop_sequences: vec!["\n\nHuman".to_string()],
        }
    }
}

impl SamplingParams {
    pub fn validate(&self) -> LlmResult<()> {
        if self.max_tokens == 0 {
            return Err(LlmError::ConfigError(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(LlmError::ConfigError(
                "temperature must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(LlmError::ConfigError(
                "top_p must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

/// A single-prompt generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_message: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_message: None,
        }
    }

    pub fn with_system_message(mut self, system_message: Option<String>) -> Self {
        self.system_message = system_message;
        self
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Text produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stop_reason: None,
            usage: TokenUsage::default(),
        }
    }
}
