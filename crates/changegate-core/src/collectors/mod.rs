//! Component fact collectors.
//!
//! One collector per component type. Each performs its live lookups through
//! [`CollectContext`], which wraps every sub-lookup in its own timeout. If any
//! lookup fails or times out the component degrades to an archived block
//! built from the submitted payload, with every check failing. Collectors
//! never return errors to the caller; one component's failure leaves the
//! others untouched.

mod catalog_item;
mod configuration_item;
mod directory_server;
mod middleware_agent;
mod template;
mod workflow;

use std::collections::BTreeMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, instrument};

use change_api::ChangeManagementApi;
use change_state::{ChangeValidationRecord, ComponentType};

use crate::config::CollectorConfig;
use crate::domain::{CollectError, ComponentFactBlock, ComponentRef};
use crate::metrics::METRICS;
use crate::normalize::{display_text, normalize_record, raw_value, text};
use crate::obs;
use crate::timeout::with_timeout;

/// Payload fields that may reference an auxiliary component.
const REFERENCE_FIELDS: [(&str, ComponentType); 11] = [
    ("template", ComponentType::Template),
    ("cat_item", ComponentType::CatalogItem),
    ("catalog_item", ComponentType::CatalogItem),
    ("workflow", ComponentType::Workflow),
    ("ldap_server", ComponentType::DirectoryServer),
    ("directory_server", ComponentType::DirectoryServer),
    ("mid_server", ComponentType::MiddlewareAgent),
    ("middleware_agent", ComponentType::MiddlewareAgent),
    ("cmdb_ci", ComponentType::ConfigurationItem),
    ("configuration_item", ComponentType::ConfigurationItem),
    ("ci", ComponentType::ConfigurationItem),
];

/// Check names a collector reports for `component_type`.
pub fn check_names(component_type: ComponentType) -> &'static [&'static str] {
    match component_type {
        ComponentType::Template => template::CHECKS,
        ComponentType::CatalogItem => catalog_item::CHECKS,
        ComponentType::Workflow => workflow::CHECKS,
        ComponentType::DirectoryServer => directory_server::CHECKS,
        ComponentType::MiddlewareAgent => middleware_agent::CHECKS,
        ComponentType::ConfigurationItem => configuration_item::CHECKS,
    }
}

/// Components referenced by a change: the primary component first, then any
/// auxiliary references in the payload, without duplicates.
pub fn detect_references(record: &ChangeValidationRecord) -> Vec<ComponentRef> {
    let mut refs: Vec<ComponentRef> = Vec::new();
    let mut push = |candidate: ComponentRef| {
        let duplicate = refs
            .iter()
            .any(|r| r.component_type == candidate.component_type && r.id == candidate.id);
        if !duplicate {
            refs.push(candidate);
        }
    };

    if let (Some(component_type), Some(id)) = (record.component_type, &record.component_id) {
        let id = id.trim();
        if !id.is_empty() {
            push(ComponentRef {
                component_type,
                id: id.to_string(),
                label: record.payload.get("component_name").and_then(display_text),
                primary: true,
            });
        }
    }

    for (field, component_type) in REFERENCE_FIELDS {
        let Some(value) = record.payload.get(field) else {
            continue;
        };
        if let Some(id) = raw_value(value) {
            let label = match value {
                Value::Object(_) => display_text(value).filter(|label| *label != id),
                _ => None,
            };
            push(ComponentRef {
                component_type,
                id,
                label,
                primary: false,
            });
        }
    }
    refs
}

/// Archived copy of a component from the submitted payload.
fn archived_snapshot<'a>(payload: &'a Value, reference: &ComponentRef) -> Option<&'a Value> {
    let from_snapshots = || {
        payload
            .get("snapshots")
            .and_then(|s| s.get(reference.component_type.key()))
            .filter(|v| v.is_object())
    };
    if reference.primary {
        payload
            .get("component")
            .filter(|v| v.is_object())
            .or_else(from_snapshots)
    } else {
        from_snapshots()
    }
}

/// Lookup handle shared by the collectors of one run.
pub struct CollectContext<'a> {
    api: &'a dyn ChangeManagementApi,
    lookup_timeout: Duration,
}

impl<'a> CollectContext<'a> {
    pub fn new(api: &'a dyn ChangeManagementApi, lookup_timeout: Duration) -> Self {
        Self {
            api,
            lookup_timeout,
        }
    }

    fn timed_out(&self, label: String) -> CollectError {
        CollectError::TimedOut {
            label,
            timeout_ms: self.lookup_timeout.as_millis() as u64,
        }
    }

    pub async fn fetch(&self, table: &str, id: &str, fields: &[&str]) -> Result<Value, CollectError> {
        let label = format!("fetch {table}/{id}");
        match with_timeout(self.api.fetch_record(table, id, fields), self.lookup_timeout, &label).await
        {
            Some(Ok(record)) => Ok(record),
            Some(Err(source)) => Err(CollectError::Api { label, source }),
            None => Err(self.timed_out(label)),
        }
    }

    pub async fn query(
        &self,
        table: &str,
        query: &str,
        limit: usize,
        fields: &[&str],
    ) -> Result<Vec<Value>, CollectError> {
        let label = format!("query {table}");
        let lookup = self.api.query_table(table, query, limit, fields);
        match with_timeout(lookup, self.lookup_timeout, &label).await {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(source)) => Err(CollectError::Api { label, source }),
            None => Err(self.timed_out(label)),
        }
    }

    pub async fn relationships(&self, ci_id: &str) -> Result<Vec<Value>, CollectError> {
        let label = format!("relationships {ci_id}");
        match with_timeout(self.api.fetch_relationships(ci_id), self.lookup_timeout, &label).await {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(source)) => Err(CollectError::Api { label, source }),
            None => Err(self.timed_out(label)),
        }
    }
}

/// What a collector observed live.
pub(crate) struct LiveFacts {
    pub display_name: String,
    pub facts: BTreeMap<String, Value>,
    pub checks: BTreeMap<String, bool>,
    pub warnings: Vec<String>,
}

impl LiveFacts {
    pub fn new(display_name: String, facts: BTreeMap<String, Value>) -> Self {
        Self {
            display_name,
            facts,
            checks: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn check(&mut self, name: &str, passed: bool) {
        self.checks.insert(name.to_string(), passed);
    }
}

/// First non-empty of `keys`, else the reference label, else the id.
pub(crate) fn display_name(
    record: &BTreeMap<String, Value>,
    reference: &ComponentRef,
    keys: &[&str],
) -> String {
    keys.iter()
        .find_map(|key| text(record, key))
        .or_else(|| reference.label.clone())
        .unwrap_or_else(|| reference.id.clone())
}

async fn collect_live(
    ctx: &CollectContext<'_>,
    reference: &ComponentRef,
    payload: &Value,
) -> Result<LiveFacts, CollectError> {
    match reference.component_type {
        ComponentType::Template => template::collect(ctx, reference, payload).await,
        ComponentType::CatalogItem => catalog_item::collect(ctx, reference).await,
        ComponentType::Workflow => workflow::collect(ctx, reference).await,
        ComponentType::DirectoryServer => directory_server::collect(ctx, reference).await,
        ComponentType::MiddlewareAgent => middleware_agent::collect(ctx, reference).await,
        ComponentType::ConfigurationItem => configuration_item::collect(ctx, reference).await,
    }
}

/// Collect one component, degrading to the archived payload on failure.
#[instrument(skip(ctx, reference, payload), fields(component_type = %reference.component_type, component_id = %reference.id))]
pub async fn collect_component(
    ctx: &CollectContext<'_>,
    reference: &ComponentRef,
    payload: &Value,
) -> ComponentFactBlock {
    let names = check_names(reference.component_type);
    match collect_live(ctx, reference, payload).await {
        Ok(mut live) => {
            for name in names {
                // unobserved checks fail
                live.checks.entry(name.to_string()).or_insert(false);
            }
            debug!(checks = live.checks.len(), "component collected live");
            ComponentFactBlock::live(
                reference,
                live.display_name,
                live.facts,
                live.checks,
                live.warnings,
            )
        }
        Err(err) => {
            obs::emit_source_degraded(reference.component_type.key(), &reference.id, &err);
            METRICS.inc_sources_degraded();
            let snapshot = archived_snapshot(payload, reference);
            let facts = snapshot.map(normalize_record).unwrap_or_default();
            let display_name = ["name", "display_name", "title", "short_description"]
                .iter()
                .find_map(|key| facts.get(*key).and_then(display_text))
                .or_else(|| reference.label.clone())
                .unwrap_or_else(|| reference.id.clone());
            let warning = match snapshot {
                Some(_) => format!(
                    "{} {}: live lookup unavailable ({err}); using archived payload, all checks assumed failing",
                    reference.component_type.label(),
                    reference.id
                ),
                None => format!(
                    "{} {}: live lookup unavailable ({err}) and no archived copy in payload; all checks assumed failing",
                    reference.component_type.label(),
                    reference.id
                ),
            };
            ComponentFactBlock::archived(reference, display_name, facts, names, warning)
        }
    }
}

/// Collect every reference with bounded concurrency, preserving order.
pub async fn collect_components(
    api: &dyn ChangeManagementApi,
    references: &[ComponentRef],
    payload: &Value,
    config: &CollectorConfig,
) -> Vec<ComponentFactBlock> {
    let ctx = CollectContext::new(api, config.lookup_timeout);
    let ctx = &ctx;
    stream::iter(references.iter().cloned())
        .map(move |reference| async move { collect_component(ctx, &reference, payload).await })
        .buffered(config.max_concurrent.max(1))
        .collect()
        .await
}

/// `a, b, ... (+N more)` rendering for long name lists.
pub fn format_list<S: AsRef<str>>(values: &[S], limit: usize) -> String {
    let seq: Vec<&str> = values
        .iter()
        .map(AsRef::as_ref)
        .filter(|v| !v.is_empty())
        .collect();
    if seq.len() <= limit {
        return seq.join(", ");
    }
    format!(
        "{}, ... (+{} more)",
        seq[..limit].join(", "),
        seq.len() - limit
    )
}
