//! Validation orchestration: collect → synthesize → normalize → publish.
//!
//! One [`ValidationPipeline::process_validation`] call evaluates exactly one
//! change record. The record moves `received → processing` before collection
//! and ends `completed` with a normalized verdict, or `failed` when the run
//! cannot continue. Degraded sources, reasoning failures and publish failures
//! never fail the run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn, Instrument};

use change_api::{ChangeManagementApi, ResultPublisher};
use change_state::{ChangeRecordStore, ChangeValidationRecord, ValidationResult};
use reasoning_client::ReasoningService;

use crate::clone_freshness;
use crate::collectors::{collect_components, detect_references};
use crate::config::PipelineConfig;
use crate::documentation::reconcile_documentation;
use crate::domain::{FactBundle, PipelineError, Result};
use crate::metrics::METRICS;
use crate::normalize::{normalize_record, present};
use crate::obs::{self, ValidationSpan};
use crate::publish::render_work_note;
use crate::synthesis::{normalize_verdict, VerdictSynthesizer};
use crate::timeout::with_timeout;

/// Change-request fields copied into the fact bundle.
const CHANGE_FIELDS: [&str; 11] = [
    "number",
    "short_description",
    "state",
    "type",
    "risk",
    "impact",
    "priority",
    "category",
    "assignment_group",
    "start_date",
    "end_date",
];

fn change_facts(live: Option<&Value>, payload: &Value) -> BTreeMap<String, Value> {
    let live = live.map(normalize_record).unwrap_or_default();
    let archived = normalize_record(payload);
    CHANGE_FIELDS
        .iter()
        .filter_map(|field| {
            let value = if present(&live, field) {
                live.get(*field)
            } else if present(&archived, field) {
                archived.get(*field)
            } else {
                None
            }?;
            Some((field.to_string(), value.clone()))
        })
        .collect()
}

/// Collect everything synthesis needs for `record`.
///
/// The change-detail fetch, the clone-freshness check and the component
/// collectors run concurrently, each under its own timeout. Clone lineage
/// is read through `clone_source`, the instance that records clones into
/// the target. Failures are folded into the bundle; this never errors.
pub async fn gather_facts(
    api: &dyn ChangeManagementApi,
    clone_source: &dyn ChangeManagementApi,
    record: &ChangeValidationRecord,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> FactBundle {
    let references = detect_references(record);
    let label = record
        .short_description()
        .map(str::to_string)
        .or_else(|| references.first().and_then(|r| r.label.clone()))
        .unwrap_or_else(|| record.change_number.clone());

    let details = with_timeout(
        api.fetch_change_details(&record.change_id),
        config.change_details_timeout,
        "change details",
    );
    let clone_check = clone_freshness::evaluate(
        clone_source,
        &config.clone_check,
        config.clone_check_timeout,
        record.component_type,
        &label,
        now,
    );
    let components = collect_components(api, &references, &record.payload, &config.collectors);
    let (details, clone_freshness, components) = tokio::join!(details, clone_check, components);

    let mut collection_errors = Vec::new();
    let live_details = match details {
        Some(Ok(value)) => Some(value),
        Some(Err(err)) => {
            warn!(change_id = %record.change_id, error = %err, "live change details unavailable");
            collection_errors.push(format!("change details unavailable: {err}"));
            None
        }
        None => {
            collection_errors.push(format!(
                "change details timed out after {} ms",
                config.change_details_timeout.as_millis()
            ));
            None
        }
    };

    FactBundle {
        change_id: record.change_id.clone(),
        change_number: record.change_number.clone(),
        primary_component: record.component_type,
        label,
        change_facts: change_facts(live_details.as_ref(), &record.payload),
        components,
        clone_freshness,
        documentation: reconcile_documentation(live_details.as_ref(), &record.payload),
        collection_errors,
    }
}

/// Runs validations against a record store and the change-management API.
pub struct ValidationPipeline {
    store: Arc<dyn ChangeRecordStore>,
    api: Arc<dyn ChangeManagementApi>,
    clone_source: Option<Arc<dyn ChangeManagementApi>>,
    publisher: Option<Arc<dyn ResultPublisher>>,
    synthesizer: VerdictSynthesizer,
    config: PipelineConfig,
}

impl ValidationPipeline {
    /// Pipeline with rule-based synthesis only and no publisher.
    pub fn new(
        store: Arc<dyn ChangeRecordStore>,
        api: Arc<dyn ChangeManagementApi>,
        config: PipelineConfig,
    ) -> Self {
        let synthesizer = VerdictSynthesizer::new(None, config.synthesis.clone());
        Self {
            store,
            api,
            clone_source: None,
            publisher: None,
            synthesizer,
            config,
        }
    }

    pub fn with_reasoning(mut self, service: Arc<dyn ReasoningService>) -> Self {
        self.synthesizer = VerdictSynthesizer::new(Some(service), self.config.synthesis.clone());
        self
    }

    /// Read clone lineage from a different instance than component facts.
    pub fn with_clone_source(mut self, api: Arc<dyn ChangeManagementApi>) -> Self {
        self.clone_source = Some(api);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ResultPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate one record and store the verdict on it.
    ///
    /// Errors only when the record cannot be loaded or stored, or when
    /// collection aborts; in the latter cases the record is marked failed.
    pub async fn process_validation(&self, record_id: &str) -> Result<ValidationResult> {
        let record = self
            .store
            .fetch_by_id(record_id)
            .await?
            .ok_or_else(|| PipelineError::RecordNotFound {
                id: record_id.to_string(),
            })?;

        let span = ValidationSpan::new(&record.id, &record.change_number);
        self.run(record).instrument(span.span()).await
    }

    async fn run(&self, record: ChangeValidationRecord) -> Result<ValidationResult> {
        let started = Instant::now();
        let record_id = record.id.clone();
        let change_id = record.change_id.clone();
        obs::emit_validation_started(&record_id, &record.change_number, detect_references(&record).len());
        self.store.mark_processing(&record_id).await?;

        let api = Arc::clone(&self.api);
        let clone_source = self.clone_source.clone().unwrap_or_else(|| Arc::clone(&api));
        let config = self.config.clone();
        let collection = tokio::spawn(
            async move {
                gather_facts(api.as_ref(), clone_source.as_ref(), &record, &config, Utc::now()).await
            }
            .in_current_span(),
        );
        let bundle = match collection.await {
            Ok(bundle) => bundle,
            Err(err) => {
                let err = PipelineError::CollectionAborted(err.to_string());
                self.fail(&record_id, &err.to_string(), started).await;
                return Err(err);
            }
        };
        debug!(
            components = bundle.components.len(),
            degraded = bundle.degraded_components().count(),
            "facts gathered"
        );

        let mut result = self.synthesizer.synthesize(&bundle).await;
        // observed checks override anything the synthesizer reported
        result.checks = Some(bundle.checks());
        result.fact_digest = match bundle.digest() {
            Ok(digest) => Some(digest),
            Err(err) => {
                warn!(error = %err, "fact bundle digest unavailable");
                None
            }
        };
        let result = normalize_verdict(result);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Err(err) = self.store.mark_completed(&record_id, &result, elapsed_ms).await {
            let reason = format!("storing verdict failed: {err}");
            self.fail(&record_id, &reason, started).await;
            return Err(err.into());
        }
        METRICS.inc_completed();
        obs::emit_validation_finished(
            &record_id,
            result.overall_status.as_str(),
            match result.synthesized_by {
                change_state::VerdictSource::ReasoningService => "reasoning_service",
                change_state::VerdictSource::RuleBased => "rule_based",
            },
            elapsed_ms,
            bundle.degraded_components().count(),
        );

        self.publish(&change_id, &bundle, &result).await;
        Ok(result)
    }

    /// Mark the record failed. A store error here is logged only.
    async fn fail(&self, record_id: &str, reason: &str, started: Instant) {
        obs::emit_validation_failed(record_id, &reason);
        METRICS.inc_failed();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Err(err) = self.store.mark_failed(record_id, reason, elapsed_ms).await {
            warn!(record_id = %record_id, error = %err, "could not mark record failed");
        }
    }

    /// Best-effort work note. Failures are logged and swallowed.
    async fn publish(&self, change_id: &str, bundle: &FactBundle, result: &ValidationResult) {
        if !self.config.publish_results {
            return;
        }
        let Some(publisher) = &self.publisher else {
            return;
        };
        let note = render_work_note(bundle, result);
        match publisher.append_work_note(change_id, &note).await {
            Ok(()) => info!(change_id = %change_id, "work note published"),
            Err(err) => obs::emit_publish_failed(change_id, &err),
        }
    }
}
