//! Error types for change-state

use thiserror::Error;

/// Errors returned by a [`crate::ChangeRecordStore`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No record with the given id
    #[error("validation record not found: {id}")]
    NotFound { id: String },

    /// The requested lifecycle transition is not allowed from the current status
    #[error("validation record {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// Record already exists
    #[error("validation record already exists: {id}")]
    Duplicate { id: String },

    /// Underlying storage failure
    #[error("storage backend error: {0}")]
    Backend(String),
}
