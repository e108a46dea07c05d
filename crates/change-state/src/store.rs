//! Record store trait for validation records.
//!
//! Record creation happens at webhook ingress, outside this workspace. The
//! pipeline only needs to load a record and move it through its lifecycle:
//!
//! ```text
//! received → processing → completed | failed
//! ```
//!
//! A record that already finished may be moved back to `processing` for a
//! re-run; implementations count those restarts in `retry_count`.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{ChangeValidationRecord, ValidationResult};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persistence boundary for [`ChangeValidationRecord`]s.
#[async_trait]
pub trait ChangeRecordStore: Send + Sync {
    /// Load a record by id. Returns `Ok(None)` if it does not exist.
    async fn fetch_by_id(&self, id: &str) -> StorageResult<Option<ChangeValidationRecord>>;

    /// Transition to `processing`. Fails if the record is already processing.
    async fn mark_processing(&self, id: &str) -> StorageResult<()>;

    /// Transition `processing → completed`, storing the verdict and elapsed time.
    async fn mark_completed(
        &self,
        id: &str,
        result: &ValidationResult,
        elapsed_ms: u64,
    ) -> StorageResult<()>;

    /// Transition `processing → failed`, storing the reason and elapsed time.
    async fn mark_failed(&self, id: &str, reason: &str, elapsed_ms: u64) -> StorageResult<()>;
}
