//! Global atomic counters for validation runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. before a CLI invocation exits).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    validations_completed: AtomicU64,
    validations_failed: AtomicU64,
    sources_degraded: AtomicU64,
    operations_timed_out: AtomicU64,
    reasoning_fallbacks: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            validations_completed: AtomicU64::new(0),
            validations_failed: AtomicU64::new(0),
            sources_degraded: AtomicU64::new(0),
            operations_timed_out: AtomicU64::new(0),
            reasoning_fallbacks: AtomicU64::new(0),
        }
    }

    pub fn inc_completed(&self) {
        self.validations_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "validations_completed", "counter incremented");
    }

    pub fn inc_failed(&self) {
        self.validations_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "validations_failed", "counter incremented");
    }

    /// A component fell back to its archived payload.
    pub fn inc_sources_degraded(&self) {
        self.sources_degraded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sources_degraded", "counter incremented");
    }

    pub fn inc_timeouts(&self) {
        self.operations_timed_out.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "operations_timed_out", "counter incremented");
    }

    /// A reasoning-service attempt was abandoned for the rule-based verdict.
    pub fn inc_reasoning_fallbacks(&self) {
        self.reasoning_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reasoning_fallbacks", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            validations_completed = self.validations_completed(),
            validations_failed = self.validations_failed(),
            sources_degraded = self.sources_degraded(),
            operations_timed_out = self.operations_timed_out(),
            reasoning_fallbacks = self.reasoning_fallbacks(),
        );
    }

    pub fn validations_completed(&self) -> u64 {
        self.validations_completed.load(Ordering::Relaxed)
    }

    pub fn validations_failed(&self) -> u64 {
        self.validations_failed.load(Ordering::Relaxed)
    }

    pub fn sources_degraded(&self) -> u64 {
        self.sources_degraded.load(Ordering::Relaxed)
    }

    pub fn operations_timed_out(&self) -> u64 {
        self.operations_timed_out.load(Ordering::Relaxed)
    }

    pub fn reasoning_fallbacks(&self) -> u64 {
        self.reasoning_fallbacks.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.validations_completed.store(0, Ordering::Relaxed);
        self.validations_failed.store(0, Ordering::Relaxed);
        self.sources_degraded.store(0, Ordering::Relaxed);
        self.operations_timed_out.store(0, Ordering::Relaxed);
        self.reasoning_fallbacks.store(0, Ordering::Relaxed);
    }
}
