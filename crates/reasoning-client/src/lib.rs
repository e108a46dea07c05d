//! Reasoning-Client: Transport for Verdict Synthesis
//!
//! This crate carries a system framing plus a conversation to a remote
//! reasoning service and returns one turn of free-form text. It does not
//! interpret the text: callers treat every turn as untrusted,
//! semi-structured output.
//!
//! A turn either is final or signals that the service paused mid-answer and
//! expects to be re-invoked with its own partial turn appended to the
//! conversation. Driving that loop is the caller's responsibility.

mod config;
mod error;
pub mod fakes;
mod http;

pub use config::ReasoningConfig;
pub use error::ReasoningError;
pub use http::HttpReasoningClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result type for reasoning-client operations
pub type Result<T> = std::result::Result<T, ReasoningError>;

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Message body: plain text, or the raw content blocks of a service turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<Value>),
}

impl MessageContent {
    /// The text of a plain-text body.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Blocks(_) => None,
        }
    }
}

/// One message in the conversation sent to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Echo a paused turn back to the service. Raw blocks are sent
    /// unchanged so non-text blocks survive the round trip.
    pub fn from_turn(turn: ReasoningTurn) -> Self {
        if turn.blocks.is_empty() {
            Self::assistant(turn.text)
        } else {
            Self {
                role: Role::Assistant,
                content: MessageContent::Blocks(turn.blocks),
            }
        }
    }
}

/// System framing plus the conversation so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    pub system: String,
    pub messages: Vec<Message>,
}

impl ReasoningRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![Message::user(prompt)],
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The service considers its answer complete
    Final,
    /// The service paused and wants to be re-invoked with this turn appended
    NeedsContinuation,
}

/// One turn of service output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTurn {
    /// Concatenated text blocks
    pub text: String,
    /// Every content block as received, text or not
    #[serde(default)]
    pub blocks: Vec<Value>,
    pub outcome: TurnOutcome,
}

impl ReasoningTurn {
    pub fn final_answer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            blocks: Vec::new(),
            outcome: TurnOutcome::Final,
        }
    }

    pub fn paused(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            blocks: Vec::new(),
            outcome: TurnOutcome::NeedsContinuation,
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<Value>) -> Self {
        self.blocks = blocks;
        self
    }
}

/// A remote service that answers one conversation turn at a time.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, request: &ReasoningRequest) -> Result<ReasoningTurn>;
}
