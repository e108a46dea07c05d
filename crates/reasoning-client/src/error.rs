//! Error types for reasoning-client

use thiserror::Error;

/// Errors produced while talking to the reasoning service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReasoningError {
    /// No endpoint or key configured
    #[error("reasoning service is not configured")]
    NotConfigured,

    /// Connection, TLS, or client-side timeout failure
    #[error("reasoning transport error: {0}")]
    Transport(String),

    /// Service answered with an error status
    #[error("reasoning service returned {status}: {detail}")]
    Status { status: u16, detail: String },

    /// Response body could not be decoded
    #[error("reasoning response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ReasoningError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ReasoningError::Status {
                status: status.as_u16(),
                detail: err.to_string(),
            }
        } else if err.is_decode() {
            ReasoningError::Decode(err.to_string())
        } else {
            ReasoningError::Transport(err.to_string())
        }
    }
}
