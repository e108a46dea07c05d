//! Changegate Core Library
//!
//! The validation orchestration pipeline for change requests: per-component
//! fact collection with bounded timeouts and archived fallback, an
//! environment clone-freshness check, documentation reconciliation, and
//! verdict synthesis through a reasoning service with a deterministic
//! rule-based fallback.
//!
//! Absence of information biases toward failing checks and `REJECT`, never
//! toward a silent `APPROVE`.

pub mod clone_freshness;
pub mod collectors;
pub mod config;
pub mod documentation;
pub mod domain;
pub mod metrics;
pub mod normalize;
pub mod obs;
pub mod orchestrator;
pub mod publish;
pub mod synthesis;
pub mod telemetry;
pub mod timeout;

pub use config::{CloneCheckConfig, CollectorConfig, PipelineConfig, SynthesisConfig};

pub use domain::{
    CloneFreshnessResult, CloneStatus, CollectError, ComponentFactBlock, ComponentRef,
    DocumentationBundle, FactBundle, FactSource, PipelineError, Result, SynthesisError,
};

pub use clone_freshness::{check_clone_freshness, evaluate as evaluate_clone_freshness};
pub use collectors::{collect_component, collect_components, detect_references, CollectContext};
pub use documentation::reconcile_documentation;
pub use orchestrator::{gather_facts, ValidationPipeline};
pub use publish::render_work_note;
pub use synthesis::{
    normalize_verdict, parse_verdict, rule_based_verdict, ParseOutcome, VerdictSynthesizer,
};
pub use timeout::with_timeout;

pub use metrics::METRICS;
pub use obs::{
    emit_publish_failed, emit_source_degraded, emit_synthesis_fallback, emit_validation_finished,
    emit_validation_started, ValidationSpan,
};
pub use telemetry::init_tracing;
