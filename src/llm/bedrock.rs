//! Amazon Bedrock `InvokeModel` provider for Anthropic models

use async_trait::async_trait;
use aws_sdk_bedrockruntime::{error::DisplayErrorContext, primitives::Blob, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::llm::{
    errors::{LlmError, LlmResult},
    provider::TextGenerator,
    types::{Generation, GenerationRequest, ModelApi, SamplingParams, TokenUsage},
};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Bedrock runtime provider
#[derive(Debug, Clone)]
pub struct BedrockProvider {
    client: Client,
    model_id: String,
    api: ModelApi,
    sampling: SamplingParams,
}

impl BedrockProvider {
    pub fn new(client: Client, model_id: String, api: ModelApi, sampling: SamplingParams) -> Self {
        Self {
            client,
            model_id,
            api,
            sampling,
        }
    }
}

#[async_trait]
impl TextGenerator for BedrockProvider {
    async fn generate(&self, request: GenerationRequest) -> LlmResult<Generation> {
        let body = build_request_body(self.api, &self.sampling, &request)?;
        debug!(
            "Invoking {} with {} byte prompt",
            self.model_id,
            request.prompt.len()
        );

        let output = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| LlmError::ApiError(DisplayErrorContext(&e).to_string()))?;

        let generation = parse_response_body(self.api, output.body().as_ref())?;
        info!(
            "Model {} replied: {} tokens (stop reason: {})",
            self.model_id,
            generation.usage.total(),
            generation.stop_reason.as_deref().unwrap_or("unknown")
        );

        Ok(generation)
    }

    fn name(&self) -> &str {
        "bedrock"
    }

    fn model(&self) -> &str {
        &self.model_id
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop_sequences: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<MessagesTurn<'a>>,
}

#[derive(Debug, Serialize)]
struct MessagesTurn<'a> {
    role: &'static str,
    content: Vec<TextBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: String,
    max_tokens_to_sample: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop_sequences: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    completion: String,
    stop_reason: Option<String>,
}

/// Serialize the `InvokeModel` body for the given format
pub fn build_request_body(
    api: ModelApi,
    sampling: &SamplingParams,
    request: &GenerationRequest,
) -> LlmResult<Vec<u8>> {
    let body = match api {
        ModelApi::Messages => serde_json::to_vec(&MessagesRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_k: sampling.top_k,
            top_p: sampling.top_p,
            stop_sequences: &sampling.stop_sequences,
            system: request.system_message.as_deref(),
            messages: vec![MessagesTurn {
                role: "user",
                content: vec![TextBlock {
                    block_type: "text",
                    text: &request.prompt,
                }],
            }],
        })?,
        ModelApi::Completion => serde_json::to_vec(&CompletionRequest {
            prompt: completion_prompt(request),
            max_tokens_to_sample: sampling.max_tokens,
            temperature: sampling.temperature,
            top_k: sampling.top_k,
            top_p: sampling.top_p,
            stop_sequences: &sampling.stop_sequences,
        })?,
    };

    Ok(body)
}

fn completion_prompt(request: &GenerationRequest) -> String {
    match &request.system_message {
        Some(system) => format!("{}\n\nHuman: {}\n\nAssistant:", system, request.prompt),
        None => format!("\n\nHuman: {}\n\nAssistant:", request.prompt),
    }
}

/// Decode an `InvokeModel` response body. The reply text is returned exactly
/// as the model produced it.
pub fn parse_response_body(api: ModelApi, body: &[u8]) -> LlmResult<Generation> {
    match api {
        ModelApi::Messages => {
            let response: MessagesResponse = serde_json::from_slice(body)?;
            let mut texts = response
                .content
                .into_iter()
                .filter(|block| block.block_type == "text")
                .filter_map(|block| block.text)
                .peekable();

            if texts.peek().is_none() {
                return Err(LlmError::ResponseError(
                    "response contained no text content".to_string(),
                ));
            }

            let usage = response
                .usage
                .map(|usage| TokenUsage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                })
                .unwrap_or_default();

            Ok(Generation {
                text: texts.collect(),
                stop_reason: response.stop_reason,
                usage,
            })
        }
        ModelApi::Completion => {
            let response: CompletionResponse = serde_json::from_slice(body)?;
            Ok(Generation {
                text: response.completion,
                stop_reason: response.stop_reason,
                usage: TokenUsage::default(),
            })
        }
    }
}
