//! Structured observability hooks for the validation lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span via [`ValidationSpan`]
//! - Emission functions for lifecycle events: start, finish, degraded
//!   sources, synthesis fallback, publish failure, timeouts
//!
//! Events are emitted at `info!` level unless they describe a degradation,
//! which is logged at `warn!`. Filtering follows `RUST_LOG`.

use tracing::{info, warn, Span};

/// Span tagged with the record id and change number of one validation run.
///
/// The span is not entered on construction. Async callers attach it with
/// `tracing::Instrument::instrument` so it follows the future across
/// worker threads; synchronous callers use [`ValidationSpan::enter`].
pub struct ValidationSpan {
    span: Span,
}

impl ValidationSpan {
    pub fn new(record_id: &str, change_number: &str) -> Self {
        Self {
            span: tracing::info_span!(
                "changegate.validation",
                record_id = %record_id,
                change_number = %change_number
            ),
        }
    }

    /// Enter the span for the lifetime of the returned guard.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn span(&self) -> Span {
        self.span.clone()
    }
}

/// Emit event: validation started for a record.
///
/// ```ignore
/// emit_validation_started("rec-1", "CHG0031234", 2);
/// // logs: event=validation.started record_id=rec-1 change_number=CHG0031234 components=2
/// ```
pub fn emit_validation_started(record_id: &str, change_number: &str, components: usize) {
    info!(
        event = "validation.started",
        record_id = %record_id,
        change_number = %change_number,
        components = components,
    );
}

/// Emit event: verdict stored, with duration and provenance.
pub fn emit_validation_finished(
    record_id: &str,
    overall_status: &str,
    synthesized_by: &str,
    duration_ms: u64,
    degraded_sources: usize,
) {
    info!(
        event = "validation.finished",
        record_id = %record_id,
        overall_status = %overall_status,
        synthesized_by = %synthesized_by,
        duration_ms = duration_ms,
        degraded_sources = degraded_sources,
    );
}

/// Emit event: a component fell back to its archived payload (warning level).
pub fn emit_source_degraded(component_type: &str, component_id: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "source.degraded",
        component_type = %component_type,
        component_id = %component_id,
        error = %error,
    );
}

/// Emit event: the reasoning service was skipped or failed and the
/// rule-based verdict is used instead (warning level).
pub fn emit_synthesis_fallback(strategy: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "synthesis.fallback", strategy = %strategy, reason = %reason);
}

/// Emit event: the work note could not be published (warning level).
pub fn emit_publish_failed(change_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "publish.failed", change_id = %change_id, error = %error);
}

/// Emit event: an external call exceeded its deadline (warning level).
pub fn emit_operation_timed_out(label: &str, timeout_ms: u64) {
    warn!(event = "operation.timed_out", label = %label, timeout_ms = timeout_ms);
}

/// Emit event: the run failed unrecoverably (warning level).
pub fn emit_validation_failed(record_id: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "validation.failed", record_id = %record_id, reason = %reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_span_create() {
        let span = ValidationSpan::new("rec-1", "CHG0000001");
        let _guard = span.enter();
        emit_validation_started("rec-1", "CHG0000001", 1);
    }
}
