//! Passage retrieval from a managed knowledge base

pub mod knowledge_base;

pub use knowledge_base::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of passages requested per query
pub const DEFAULT_NUMBER_OF_RESULTS: i32 = 4;

/// A text passage relevant to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub source: Option<String>,
    pub score: Option<f64>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
            score: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Retrieval request failed: {0}")]
    ApiError(String),

    #[error("Invalid retrieval query: {0}")]
    InvalidQuery(String),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Trait for retrieval backends
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Passages relevant to `query`, most relevant first
    async fn retrieve(&self, query: &str) -> RetrievalResult<Vec<Passage>>;

    fn name(&self) -> &str;
}

/// Join passage texts into the `{context}` block of a prompt
pub fn format_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|passage| passage.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
