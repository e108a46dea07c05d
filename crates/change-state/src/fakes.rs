//! In-memory fakes for the record store (testing and local runs)
//!
//! `MemoryChangeStore` satisfies the [`ChangeRecordStore`] contract without
//! any external dependency and enforces the same lifecycle transitions a
//! real backend would.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::schema::{ChangeValidationRecord, ValidationResult, ValidationStatus};
use crate::store::{ChangeRecordStore, StorageResult};

/// In-memory record store backed by a `HashMap<record id, record>`.
#[derive(Debug, Default)]
pub struct MemoryChangeStore {
    records: Mutex<HashMap<String, ChangeValidationRecord>>,
}

impl MemoryChangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a received record, as webhook ingress would.
    pub fn insert(&self, record: ChangeValidationRecord) -> StorageResult<()> {
        let mut records = self.lock()?;
        if records.contains_key(&record.id) {
            return Err(StorageError::Duplicate { id: record.id });
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Current snapshot of a record.
    pub fn get(&self, id: &str) -> Option<ChangeValidationRecord> {
        self.lock().ok().and_then(|records| records.get(id).cloned())
    }

    fn lock(
        &self,
    ) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, ChangeValidationRecord>>> {
        self.records
            .lock()
            .map_err(|e| StorageError::Backend(format!("store lock poisoned: {e}")))
    }

    fn transition<F>(&self, id: &str, to: ValidationStatus, apply: F) -> StorageResult<()>
    where
        F: FnOnce(&mut ChangeValidationRecord),
    {
        let mut records = self.lock()?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })?;

        let allowed = match to {
            ValidationStatus::Processing => record.status != ValidationStatus::Processing,
            ValidationStatus::Completed | ValidationStatus::Failed => {
                record.status == ValidationStatus::Processing
            }
            ValidationStatus::Received => false,
        };
        if !allowed {
            return Err(StorageError::InvalidTransition {
                id: id.to_string(),
                from: record.status.to_string(),
                to: to.to_string(),
            });
        }

        tracing::debug!(record_id = %id, from = %record.status, to = %to, "record transition");
        apply(record);
        record.status = to;
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ChangeRecordStore for MemoryChangeStore {
    async fn fetch_by_id(&self, id: &str) -> StorageResult<Option<ChangeValidationRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn mark_processing(&self, id: &str) -> StorageResult<()> {
        self.transition(id, ValidationStatus::Processing, |record| {
            if record.status != ValidationStatus::Received {
                record.retry_count += 1;
            }
            record.failure_reason = None;
        })
    }

    async fn mark_completed(
        &self,
        id: &str,
        result: &ValidationResult,
        elapsed_ms: u64,
    ) -> StorageResult<()> {
        let result = result.clone();
        self.transition(id, ValidationStatus::Completed, move |record| {
            record.verdict = Some(result);
            record.processing_ms = Some(elapsed_ms);
        })
    }

    async fn mark_failed(&self, id: &str, reason: &str, elapsed_ms: u64) -> StorageResult<()> {
        self.transition(id, ValidationStatus::Failed, |record| {
            record.failure_reason = Some(reason.to_string());
            record.processing_ms = Some(elapsed_ms);
        })
    }
}
