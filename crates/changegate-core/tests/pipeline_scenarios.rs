//! End-to-end validation runs against in-memory and scripted fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use change_api::fakes::{FakeChangeApi, RecordingPublisher};
use change_api::ChangeManagementApi;
use change_state::fakes::MemoryChangeStore;
use change_state::{
    ChangeRecordStore, ChangeValidationRecord, ComponentType, OverallStatus, StorageError,
    ValidationResult, ValidationStatus, VerdictSource,
};
use changegate_core::{
    evaluate_clone_freshness, gather_facts, CloneCheckConfig, CloneStatus, FactSource,
    PipelineConfig, PipelineError, SynthesisConfig, ValidationPipeline,
};
use reasoning_client::fakes::ScriptedReasoner;
use reasoning_client::ReasoningTurn;

fn documented_payload(extra: Value) -> Value {
    let mut payload = json!({
        "short_description": "Publish onboarding workflow",
        "implementation_plan": "Publish version 4",
        "backout_plan": "Re-publish version 3",
        "test_plan": "Run onboarding smoke test",
        "justification": "Audit finding 42"
    });
    if let (Some(base), Value::Object(extra)) = (payload.as_object_mut(), extra) {
        base.extend(extra);
    }
    payload
}

fn workflow_record(payload: Value) -> ChangeValidationRecord {
    ChangeValidationRecord::new("chg-1", "CHG0031234", payload)
        .with_component(ComponentType::Workflow, "wf1")
}

fn healthy_workflow_api() -> FakeChangeApi {
    FakeChangeApi::new()
        .with_record(
            "wf_workflow",
            "wf1",
            json!({"name": "Onboarding", "sys_scope": {"value": "global", "display_value": "Global"}}),
        )
        .with_query_rows(
            "wf_workflow_version",
            vec![json!({"published": "true", "checked_out": "", "active": "true"})],
        )
}

fn pipeline(
    store: &Arc<MemoryChangeStore>,
    api: FakeChangeApi,
    config: PipelineConfig,
) -> ValidationPipeline {
    ValidationPipeline::new(store.clone(), Arc::new(api), config)
}

fn stored(store: &MemoryChangeStore, record: ChangeValidationRecord) -> String {
    let id = record.id.clone();
    store.insert(record).unwrap();
    id
}

#[tokio::test(start_paused = true)]
async fn workflow_timeout_degrades_to_archived_and_rejects() {
    let store = Arc::new(MemoryChangeStore::new());
    let id = stored(&store, workflow_record(documented_payload(json!({}))));
    let api = healthy_workflow_api().with_delay("wf_workflow", Duration::from_secs(120));

    let result = pipeline(&store, api, PipelineConfig::default())
        .process_validation(&id)
        .await
        .unwrap();

    assert_eq!(result.overall_status, OverallStatus::Reject);
    assert_eq!(result.synthesized_by, VerdictSource::RuleBased);
    let checks = result.checks.as_ref().unwrap();
    assert_eq!(checks["workflow_is_published"], false);
    assert_eq!(checks["workflow_not_checked_out"], false);
    assert_eq!(checks["workflow_has_scope"], false);
    assert_eq!(checks["workflow_is_active"], false);
    assert_eq!(checks["has_rollback_plan"], true);
    assert!(!result.required_actions.is_empty());

    let record = store.get(&id).unwrap();
    assert_eq!(record.status, ValidationStatus::Completed);
    assert_eq!(record.verdict, Some(result));
}

#[tokio::test]
async fn fenced_approve_keeps_empty_actions() {
    let store = Arc::new(MemoryChangeStore::new());
    let id = stored(&store, workflow_record(documented_payload(json!({}))));
    let reasoner = Arc::new(ScriptedReasoner::answering(
        "Verdict below.\n```json\n{\"overall_status\": \"APPROVE\", \"synthesis\": \"Workflow is published and documented.\"}\n```",
    ));

    let result = pipeline(&store, healthy_workflow_api(), PipelineConfig::default())
        .with_reasoning(reasoner.clone())
        .process_validation(&id)
        .await
        .unwrap();

    assert_eq!(result.overall_status, OverallStatus::Approve);
    assert_eq!(result.synthesized_by, VerdictSource::ReasoningService);
    assert!(result.required_actions.is_empty());
    assert_eq!(result.synthesis, "Workflow is published and documented.");
    assert!(result.fact_digest.as_ref().is_some_and(|d| d.len() == 64));
    assert_eq!(reasoner.call_count(), 1);
    assert!(reasoner.requests()[0].messages[0]
        .content
        .as_text()
        .is_some_and(|text| text.contains("CHG0031234")));
}

#[tokio::test]
async fn turn_limit_falls_back_and_completes() {
    let store = Arc::new(MemoryChangeStore::new());
    let id = stored(&store, workflow_record(documented_payload(json!({}))));
    let reasoner = Arc::new(ScriptedReasoner::repeating(ReasoningTurn::paused(
        "Let me check the workflow versions first.",
    )));
    let config = PipelineConfig {
        synthesis: SynthesisConfig {
            max_turns: 3,
            ..SynthesisConfig::default()
        },
        ..PipelineConfig::default()
    };

    let result = pipeline(&store, healthy_workflow_api(), config)
        .with_reasoning(reasoner.clone())
        .process_validation(&id)
        .await
        .unwrap();

    assert_eq!(reasoner.call_count(), 3);
    assert_eq!(result.synthesized_by, VerdictSource::RuleBased);
    assert_eq!(result.overall_status, OverallStatus::Approve);
    assert_eq!(store.get(&id).unwrap().status, ValidationStatus::Completed);
}

#[tokio::test]
async fn non_approve_service_verdict_gets_an_action() {
    let store = Arc::new(MemoryChangeStore::new());
    let id = stored(&store, workflow_record(documented_payload(json!({}))));
    let reasoner = Arc::new(ScriptedReasoner::answering(
        "{overall_status: \"APPROVE_WITH_CONDITIONS\", risks: [\"weekend window\",],}",
    ));

    let result = pipeline(&store, healthy_workflow_api(), PipelineConfig::default())
        .with_reasoning(reasoner)
        .process_validation(&id)
        .await
        .unwrap();

    assert_eq!(result.overall_status, OverallStatus::ApproveWithConditions);
    assert_eq!(result.risks, vec!["weekend window"]);
    assert_eq!(result.required_actions.len(), 1);
}

#[tokio::test]
async fn clone_check_skipped_without_network_calls() {
    let api = FakeChangeApi::new();
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
    let result = evaluate_clone_freshness(
        &api,
        &CloneCheckConfig::default(),
        Duration::from_secs(20),
        Some(ComponentType::Template),
        "Update onboarding template",
        now,
    )
    .await;

    assert_eq!(result.status, CloneStatus::Skipped);
    assert_eq!(result.is_fresh, None);
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn stale_clone_fails_environment_check() {
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
    let api = FakeChangeApi::new().with_query_rows(
        "sys_clone_history",
        vec![json!({"last_completed_time": "2026-08-01 06:00:00"})],
    );
    let record = ChangeValidationRecord::new(
        "chg-2",
        "CHG0031235",
        json!({"short_description": "Post-clone template refresh"}),
    )
    .with_component(ComponentType::Template, "tpl1");

    let bundle = gather_facts(&api, &api, &record, &PipelineConfig::default(), now).await;

    assert_eq!(bundle.clone_freshness.status, CloneStatus::Stale);
    assert_eq!(bundle.clone_freshness.age_days, Some(75));
    assert_eq!(bundle.checks()["environment_is_fresh"], false);
}

#[tokio::test]
async fn clone_history_fallback_table() {
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
    let api = FakeChangeApi::new()
        .with_query_error(
            "sys_clone_history",
            change_api::ApiError::Status {
                status: 400,
                detail: "Invalid table sys_clone_history".into(),
            },
        )
        .with_query_rows(
            "sn_instance_clone_request",
            vec![json!({"completed": "2026-10-10 12:00:00"})],
        );
    let result = evaluate_clone_freshness(
        &api,
        &CloneCheckConfig::default(),
        Duration::from_secs(20),
        Some(ComponentType::ConfigurationItem),
        "Clone PROD to UAT",
        now,
    )
    .await;

    assert_eq!(result.status, CloneStatus::Ok);
    assert_eq!(result.is_fresh, Some(true));
    assert_eq!(
        api.calls(),
        vec!["query:sys_clone_history", "query:sn_instance_clone_request"]
    );
}

#[tokio::test]
async fn archived_alias_only_documentation_resolves() {
    let api = FakeChangeApi::new();
    let record = ChangeValidationRecord::new(
        "chg-3",
        "CHG0031236",
        json!({"business_justification": "Vendor end of support"}),
    );
    let bundle = gather_facts(&api, &api, &record, &PipelineConfig::default(), Utc::now()).await;

    assert_eq!(bundle.documentation.justification, "Vendor end of support");
    assert_eq!(bundle.documentation.test_plan, "");
    assert_eq!(bundle.collection_errors.len(), 1);
    assert!(bundle.components.is_empty());
}

#[tokio::test]
async fn live_documentation_wins_over_payload() {
    let api = FakeChangeApi::new().with_change_details(
        "chg-1",
        json!({"backout_plan": {"value": "", "display_value": "Restore snapshot"}, "number": "CHG0031234"}),
    );
    let record = workflow_record(documented_payload(json!({})));
    let bundle = gather_facts(&api, &api, &record, &PipelineConfig::default(), Utc::now()).await;

    assert_eq!(bundle.documentation.rollback_plan, "Restore snapshot");
    assert_eq!(bundle.documentation.implementation_plan, "Publish version 4");
    assert!(bundle.collection_errors.is_empty());
    assert_eq!(bundle.components[0].source, FactSource::Archived);
}

#[tokio::test]
async fn publisher_failure_keeps_completed_verdict() {
    let store = Arc::new(MemoryChangeStore::new());
    let id = stored(&store, workflow_record(documented_payload(json!({}))));

    let result = pipeline(&store, healthy_workflow_api(), PipelineConfig::default())
        .with_publisher(Arc::new(RecordingPublisher::failing()))
        .process_validation(&id)
        .await
        .unwrap();

    let record = store.get(&id).unwrap();
    assert_eq!(record.status, ValidationStatus::Completed);
    assert_eq!(record.verdict, Some(result));
}

#[tokio::test]
async fn work_note_is_published_to_the_change() {
    let store = Arc::new(MemoryChangeStore::new());
    let id = stored(&store, workflow_record(documented_payload(json!({}))));
    let publisher = Arc::new(RecordingPublisher::new());

    pipeline(&store, healthy_workflow_api(), PipelineConfig::default())
        .with_publisher(publisher.clone())
        .process_validation(&id)
        .await
        .unwrap();

    let notes = publisher.notes();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].0, "chg-1");
    assert!(notes[0].1.starts_with("Changegate validation: APPROVE"));
    assert!(notes[0].1.contains("✓ Workflow Onboarding [live]"));
}

#[tokio::test]
async fn publishing_can_be_disabled() {
    let store = Arc::new(MemoryChangeStore::new());
    let id = stored(&store, workflow_record(documented_payload(json!({}))));
    let publisher = Arc::new(RecordingPublisher::new());

    pipeline(
        &store,
        healthy_workflow_api(),
        PipelineConfig::default().with_publish_results(false),
    )
    .with_publisher(publisher.clone())
    .process_validation(&id)
    .await
    .unwrap();

    assert!(publisher.notes().is_empty());
}

#[tokio::test]
async fn missing_record_is_an_error() {
    let store = Arc::new(MemoryChangeStore::new());
    let err = pipeline(&store, FakeChangeApi::new(), PipelineConfig::default())
        .process_validation("does-not-exist")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::RecordNotFound { id } if id == "does-not-exist"));
}

#[tokio::test]
async fn record_already_processing_is_a_storage_error() {
    let store = Arc::new(MemoryChangeStore::new());
    let id = stored(&store, workflow_record(documented_payload(json!({}))));
    store.mark_processing(&id).await.unwrap();

    let err = pipeline(&store, healthy_workflow_api(), PipelineConfig::default())
        .process_validation(&id)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Storage(_)));
}

#[tokio::test]
async fn clone_lineage_is_read_from_the_clone_source() {
    let store = Arc::new(MemoryChangeStore::new());
    let record = ChangeValidationRecord::new(
        "chg-4",
        "CHG0031237",
        documented_payload(json!({"short_description": "Post-clone template refresh"})),
    )
    .with_component(ComponentType::Template, "tpl1");
    let id = stored(&store, record);

    let target = Arc::new(FakeChangeApi::new());
    let source = Arc::new(FakeChangeApi::new().with_query_rows(
        "sys_clone_history",
        vec![json!({"last_completed_time": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()})],
    ));

    let result = ValidationPipeline::new(store.clone(), target.clone(), PipelineConfig::default())
        .with_clone_source(source.clone())
        .process_validation(&id)
        .await
        .unwrap();

    assert_eq!(result.checks.as_ref().unwrap()["environment_is_fresh"], true);
    assert_eq!(source.calls(), vec!["query:sys_clone_history"]);
    assert!(!target.calls().iter().any(|call| call.contains("clone")));
}

/// Change-management API whose every call panics.
struct PanickingApi;

#[async_trait]
impl ChangeManagementApi for PanickingApi {
    async fn fetch_change_details(&self, _change_id: &str) -> change_api::Result<Value> {
        panic!("api exploded")
    }

    async fn fetch_record(
        &self,
        _table: &str,
        _id: &str,
        _fields: &[&str],
    ) -> change_api::Result<Value> {
        panic!("api exploded")
    }

    async fn fetch_relationships(&self, _ci_id: &str) -> change_api::Result<Vec<Value>> {
        panic!("api exploded")
    }

    async fn query_table(
        &self,
        _table: &str,
        _query: &str,
        _limit: usize,
        _fields: &[&str],
    ) -> change_api::Result<Vec<Value>> {
        panic!("api exploded")
    }
}

#[tokio::test]
async fn aborted_collection_marks_the_record_failed() {
    let store = Arc::new(MemoryChangeStore::new());
    let id = stored(&store, workflow_record(documented_payload(json!({}))));

    let err = ValidationPipeline::new(store.clone(), Arc::new(PanickingApi), PipelineConfig::default())
        .process_validation(&id)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::CollectionAborted(_)));
    let message = err.to_string();
    assert!(message.starts_with("fact collection aborted: "));
    assert_eq!(message.matches("fact collection aborted").count(), 1);

    let record = store.get(&id).unwrap();
    assert_eq!(record.status, ValidationStatus::Failed);
    assert_eq!(record.verdict, None);
    let reason = record.failure_reason.unwrap();
    assert_eq!(reason, message);
    assert!(reason.contains("api exploded"));
}

/// Store that cannot persist verdicts.
struct VerdictRejectingStore {
    inner: MemoryChangeStore,
}

#[async_trait]
impl ChangeRecordStore for VerdictRejectingStore {
    async fn fetch_by_id(&self, id: &str) -> Result<Option<ChangeValidationRecord>, StorageError> {
        self.inner.fetch_by_id(id).await
    }

    async fn mark_processing(&self, id: &str) -> Result<(), StorageError> {
        self.inner.mark_processing(id).await
    }

    async fn mark_completed(
        &self,
        _id: &str,
        _result: &ValidationResult,
        _elapsed_ms: u64,
    ) -> Result<(), StorageError> {
        Err(StorageError::Backend("disk full".into()))
    }

    async fn mark_failed(&self, id: &str, reason: &str, elapsed_ms: u64) -> Result<(), StorageError> {
        self.inner.mark_failed(id, reason, elapsed_ms).await
    }
}

#[tokio::test]
async fn unstorable_verdict_marks_the_record_failed() {
    let inner = MemoryChangeStore::new();
    let id = stored(&inner, workflow_record(documented_payload(json!({}))));
    let store = Arc::new(VerdictRejectingStore { inner });

    let err = ValidationPipeline::new(store.clone(), Arc::new(healthy_workflow_api()), PipelineConfig::default())
        .process_validation(&id)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Storage(StorageError::Backend(_))));
    let record = store.inner.get(&id).unwrap();
    assert_eq!(record.status, ValidationStatus::Failed);
    assert_eq!(
        record.failure_reason.as_deref(),
        Some("storing verdict failed: storage backend error: disk full")
    );
}
