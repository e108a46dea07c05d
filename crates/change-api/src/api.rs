//! Trait boundaries consumed by the validation pipeline.
//!
//! Records are returned as raw JSON: field shapes vary by table and by the
//! display-value mode of the instance, so normalization is the caller's job.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Read access to the change-management system.
#[async_trait]
pub trait ChangeManagementApi: Send + Sync {
    /// Load the live change request record.
    async fn fetch_change_details(&self, change_id: &str) -> Result<Value>;

    /// Load one record from `table`. An empty `fields` slice returns all fields.
    async fn fetch_record(&self, table: &str, id: &str, fields: &[&str]) -> Result<Value>;

    /// Relationship rows where the configuration item is parent or child.
    async fn fetch_relationships(&self, ci_id: &str) -> Result<Vec<Value>>;

    /// Run an encoded query against `table`.
    async fn query_table(
        &self,
        table: &str,
        query: &str,
        limit: usize,
        fields: &[&str],
    ) -> Result<Vec<Value>>;
}

/// Write-back channel for verdicts.
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    /// Append a work note to the change request.
    async fn append_work_note(&self, change_id: &str, text: &str) -> Result<()>;
}
