//! Error taxonomy for the validation pipeline.
//!
//! Only [`PipelineError`] ever leaves [`crate::ValidationPipeline`]. Collector
//! and synthesis errors are absorbed where they occur and turned into
//! degraded facts or a rule-based verdict.

use change_api::ApiError;
use change_state::StorageError;
use reasoning_client::ReasoningError;

/// A single live lookup failed. Never escapes collection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollectError {
    #[error("{label} timed out after {timeout_ms} ms")]
    TimedOut { label: String, timeout_ms: u64 },

    #[error("{label} failed: {source}")]
    Api {
        label: String,
        #[source]
        source: ApiError,
    },
}

/// One reasoning-service attempt failed. Recovered by the rule-based fallback.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SynthesisError {
    #[error("reasoning service call failed: {0}")]
    Service(#[from] ReasoningError),

    #[error("reasoning turn {turn} timed out after {timeout_ms} ms")]
    TimedOut { turn: usize, timeout_ms: u64 },

    #[error("reasoning service did not finish within {max_turns} turns")]
    TurnLimitExceeded { max_turns: usize },

    #[error("no verdict object found in reasoning output ({candidates} candidates tried)")]
    Unparseable { candidates: usize },

    #[error("fact bundle could not be serialized: {0}")]
    Prompt(String),
}

/// Unrecoverable failure of a validation run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("validation record not found: {id}")]
    RecordNotFound { id: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("fact collection aborted: {0}")]
    CollectionAborted(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_error_keeps_api_source() {
        let err = CollectError::Api {
            label: "fetch wf_workflow/abc".into(),
            source: ApiError::Status {
                status: 500,
                detail: "boom".into(),
            },
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert!(source.unwrap().contains("500"));
    }

    #[test]
    fn storage_error_converts() {
        let err: PipelineError = StorageError::NotFound { id: "r1".into() }.into();
        assert!(matches!(err, PipelineError::Storage(_)));
    }
}
