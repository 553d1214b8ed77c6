//! A chat session: one history bound to one request chain

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    chain::{ChainError, RequestChain},
    retrieval::Passage,
    session::history::{ChatHistory, ChatMessage, MessageRole},
};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Chain(#[from] ChainError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Outcome of a successful turn
#[derive(Debug, Clone)]
pub struct Turn {
    pub reply: ChatMessage,
    pub context: Vec<Passage>,
}

/// Session statistics
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub persona: String,
    pub message_count: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub failed_turns: usize,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

pub struct ChatSession {
    id: String,
    persona: String,
    chain: RequestChain,
    history: ChatHistory,
    failed_turns: usize,
    created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(persona: impl Into<String>, chain: RequestChain) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            persona: persona.into(),
            chain,
            history: ChatHistory::new(),
            failed_turns: 0,
            created_at: Utc::now(),
        }
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn chain(&self) -> &RequestChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut RequestChain {
        &mut self.chain
    }

    /// Process one user message.
    ///
    /// The user message is recorded before the chain runs and stays in the
    /// history even when the turn fails. The chain sees only the messages that
    /// came before it.
    pub async fn submit(&mut self, text: &str) -> SessionResult<Turn> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let prior = self.history.messages().to_vec();
        self.history.push_user(text);
        debug!(
            "Session {} turn {} started",
            self.id,
            self.history.count(MessageRole::User)
        );

        match self.chain.run(text, &prior).await {
            Ok(output) => {
                let reply = self
                    .history
                    .push_assistant(output.text, output.audio)
                    .clone();
                Ok(Turn {
                    reply,
                    context: output.context,
                })
            }
            Err(e) => {
                self.failed_turns += 1;
                warn!("Session {} turn failed: {}", self.id, e);
                Err(e.into())
            }
        }
    }

    pub fn reset(&mut self) {
        if self.history.is_empty() {
            return;
        }
        debug!("Session {} reset ({} messages dropped)", self.id, self.history.len());
        self.history.clear();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id.clone(),
            persona: self.persona.clone(),
            message_count: self.history.len(),
            user_messages: self.history.count(MessageRole::User),
            assistant_messages: self.history.count(MessageRole::Assistant),
            failed_turns: self.failed_turns,
            created_at: self.created_at,
            last_message_at: self.history.last().map(|message| message.timestamp),
        }
    }
}
