//! Error types for text generation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unexpected response from model: {0}")]
    ResponseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type LlmResult<T> = Result<T, LlmError>;
