//! Generator trait and factory

use async_trait::async_trait;
use aws_config::SdkConfig;
use std::sync::Arc;

use crate::llm::{
    bedrock::BedrockProvider,
    errors::{LlmError, LlmResult},
    types::{Generation, GenerationRequest, ModelApi, SamplingParams},
};

/// Trait for text generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply for a filled prompt
    async fn generate(&self, request: GenerationRequest) -> LlmResult<Generation>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model name
    fn model(&self) -> &str;
}

/// Settings needed to build a generator
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub model_id: String,
    pub api: ModelApi,
    pub sampling: SamplingParams,
}

/// Factory for creating generators
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a Bedrock generator on top of a resolved SDK configuration
    pub fn create_generator(
        config: GeneratorConfig,
        sdk_config: &SdkConfig,
    ) -> LlmResult<Arc<dyn TextGenerator>> {
        if config.model_id.trim().is_empty() {
            return Err(LlmError::ConfigError("model_id is required".to_string()));
        }
        config.sampling.validate()?;

        let client = aws_sdk_bedrockruntime::Client::new(sdk_config);
        Ok(Arc::new(BedrockProvider::new(
            client,
            config.model_id,
            config.api,
            config.sampling,
        )))
    }
}
