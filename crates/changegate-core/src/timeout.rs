//! Deadline wrapper for external calls.

use std::future::Future;
use std::time::Duration;

use crate::metrics::METRICS;
use crate::obs;

/// Race `operation` against `timeout`.
///
/// Returns `None` when the deadline fires first. The operation is dropped at
/// that point; anything it already sent is not undone. `None` means
/// "unknown" and must never be read as a pass. No retries happen here.
pub async fn with_timeout<F, T>(operation: F, timeout: Duration, label: &str) -> Option<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(value) => Some(value),
        Err(_) => {
            obs::emit_operation_timed_out(label, timeout.as_millis() as u64);
            METRICS.inc_timeouts();
            None
        }
    }
}
