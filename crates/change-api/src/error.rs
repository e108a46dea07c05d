//! Error types for change-api

use thiserror::Error;

/// Errors returned by the change-management client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with an error status
    #[error("change-management request failed ({status}): {detail}")]
    Status { status: u16, detail: String },

    /// Connection, TLS, or timeout failure before a response arrived
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// Record lookup returned nothing
    #[error("record not found: {table}/{id}")]
    NotFound { table: String, id: String },

    /// Response body had no `result` member
    #[error("response missing 'result'")]
    MissingResult,

    /// Credentials or client settings are missing or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(String),
}

impl ApiError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Transport failures, 408, 429 and 5xx are transient; every other
    /// status and all client-side errors are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => {
                matches!(*status, 408 | 429) || (500..=599).contains(status)
            }
            _ => false,
        }
    }

    /// Whether the server rejected the table name itself.
    pub fn is_invalid_table(&self) -> bool {
        match self {
            ApiError::Status { detail, .. } => detail.contains("Invalid table"),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                detail: err.to_string(),
            }
        } else if err.is_decode() {
            ApiError::Json(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}
