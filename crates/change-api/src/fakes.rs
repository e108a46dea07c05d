//! Scripted fakes for the change-management boundary (testing only)
//!
//! `FakeChangeApi` serves canned records, query rows and errors, can delay
//! any table to simulate a slow instance, and counts every call so tests can
//! assert that a code path made no network requests at all.
//! `RecordingPublisher` captures work notes, or fails on demand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ChangeManagementApi, ResultPublisher};
use crate::error::ApiError;
use crate::Result;

const CHANGE_TABLE: &str = "change_request";
const RELATIONSHIP_TABLE: &str = "cmdb_rel_ci";

/// In-memory change-management API.
#[derive(Debug, Default)]
pub struct FakeChangeApi {
    records: HashMap<(String, String), Result<Value>>,
    queries: HashMap<String, Result<Vec<Value>>>,
    relationships: HashMap<String, Result<Vec<Value>>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    call_log: Mutex<Vec<String>>,
}

impl FakeChangeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `value` for the live change request `change_id`.
    pub fn with_change_details(self, change_id: &str, value: Value) -> Self {
        self.with_record(CHANGE_TABLE, change_id, value)
    }

    pub fn with_record(mut self, table: &str, id: &str, value: Value) -> Self {
        self.records
            .insert((table.to_string(), id.to_string()), Ok(value));
        self
    }

    pub fn with_record_error(mut self, table: &str, id: &str, err: ApiError) -> Self {
        self.records
            .insert((table.to_string(), id.to_string()), Err(err));
        self
    }

    /// Serve `rows` for any query against `table`.
    pub fn with_query_rows(mut self, table: &str, rows: Vec<Value>) -> Self {
        self.queries.insert(table.to_string(), Ok(rows));
        self
    }

    pub fn with_query_error(mut self, table: &str, err: ApiError) -> Self {
        self.queries.insert(table.to_string(), Err(err));
        self
    }

    pub fn with_relationships(mut self, ci_id: &str, rows: Vec<Value>) -> Self {
        self.relationships.insert(ci_id.to_string(), Ok(rows));
        self
    }

    /// Delay every call touching `table` (use `change_request` for change
    /// details and `cmdb_rel_ci` for relationships).
    pub fn with_delay(mut self, table: &str, delay: Duration) -> Self {
        self.delays.insert(table.to_string(), delay);
        self
    }

    /// Total number of calls made through the trait.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls in arrival order, formatted as `op:table[/id]`.
    pub fn calls(&self) -> Vec<String> {
        self.call_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    async fn record_call(&self, op: &str, table: &str, id: Option<&str>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let entry = match id {
            Some(id) => format!("{op}:{table}/{id}"),
            None => format!("{op}:{table}"),
        };
        if let Ok(mut log) = self.call_log.lock() {
            log.push(entry);
        }
        if let Some(delay) = self.delays.get(table) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait]
impl ChangeManagementApi for FakeChangeApi {
    async fn fetch_change_details(&self, change_id: &str) -> Result<Value> {
        self.fetch_record(CHANGE_TABLE, change_id, &[]).await
    }

    async fn fetch_record(&self, table: &str, id: &str, _fields: &[&str]) -> Result<Value> {
        self.record_call("fetch", table, Some(id)).await;
        self.records
            .get(&(table.to_string(), id.to_string()))
            .cloned()
            .unwrap_or_else(|| {
                Err(ApiError::NotFound {
                    table: table.to_string(),
                    id: id.to_string(),
                })
            })
    }

    async fn fetch_relationships(&self, ci_id: &str) -> Result<Vec<Value>> {
        self.record_call("relationships", RELATIONSHIP_TABLE, Some(ci_id))
            .await;
        self.relationships
            .get(ci_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn query_table(
        &self,
        table: &str,
        _query: &str,
        limit: usize,
        _fields: &[&str],
    ) -> Result<Vec<Value>> {
        self.record_call("query", table, None).await;
        match self.queries.get(table).cloned() {
            Some(Ok(rows)) => Ok(rows.into_iter().take(limit).collect()),
            Some(Err(err)) => Err(err),
            None => Ok(Vec::new()),
        }
    }
}

/// Work-note sink that records every note, or fails every call.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    notes: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose every call fails with a 503.
    pub fn failing() -> Self {
        Self {
            notes: Mutex::default(),
            fail: true,
        }
    }

    /// Notes published so far as `(change_id, text)`.
    pub fn notes(&self) -> Vec<(String, String)> {
        self.notes.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ResultPublisher for RecordingPublisher {
    async fn append_work_note(&self, change_id: &str, text: &str) -> Result<()> {
        if self.fail {
            return Err(ApiError::Status {
                status: 503,
                detail: "service unavailable".to_string(),
            });
        }
        if let Ok(mut notes) = self.notes.lock() {
            notes.push((change_id.to_string(), text.to_string()));
        }
        Ok(())
    }
}
