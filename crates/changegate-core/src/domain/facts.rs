//! Transient fact types computed during one validation run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use change_state::ComponentType;

// ---------------------------------------------------------------------------
// Component references
// ---------------------------------------------------------------------------

/// A component a change request points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub component_type: ComponentType,
    pub id: String,
    /// Display label carried by the payload reference, if any
    pub label: Option<String>,
    /// The component the change was filed against
    pub primary: bool,
}

// ---------------------------------------------------------------------------
// Component fact blocks
// ---------------------------------------------------------------------------

/// Where a fact block's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactSource {
    Live,
    Archived,
}

/// Facts and derived checks for one component.
///
/// # Invariants
///
/// When `source` is [`FactSource::Archived`], `archived` is true and every
/// entry in `checks` is `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentFactBlock {
    pub component_type: ComponentType,
    pub component_id: String,
    pub display_name: String,
    pub source: FactSource,
    pub archived: bool,
    pub facts: BTreeMap<String, Value>,
    pub checks: BTreeMap<String, bool>,
    pub warnings: Vec<String>,
}

impl ComponentFactBlock {
    /// Block built from live lookups.
    pub fn live(
        reference: &ComponentRef,
        display_name: String,
        facts: BTreeMap<String, Value>,
        checks: BTreeMap<String, bool>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            component_type: reference.component_type,
            component_id: reference.id.clone(),
            display_name,
            source: FactSource::Live,
            archived: false,
            facts,
            checks,
            warnings,
        }
    }

    /// Degraded block built from the submitted payload. Every named check is
    /// recorded as failing.
    pub fn archived(
        reference: &ComponentRef,
        display_name: String,
        facts: BTreeMap<String, Value>,
        check_names: &[&str],
        warning: String,
    ) -> Self {
        Self {
            component_type: reference.component_type,
            component_id: reference.id.clone(),
            display_name,
            source: FactSource::Archived,
            archived: true,
            facts,
            checks: check_names
                .iter()
                .map(|name| (name.to_string(), false))
                .collect(),
            warnings: vec![warning],
        }
    }

    pub fn failing_checks(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Clone freshness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneStatus {
    Ok,
    Stale,
    NotFound,
    Error,
    Skipped,
}

impl CloneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Stale => "stale",
            Self::NotFound => "not_found",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

/// Outcome of the environment clone-freshness check.
///
/// `is_fresh = None` means "could not determine" and is never treated as
/// fresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneFreshnessResult {
    pub status: CloneStatus,
    pub target_environment: String,
    pub source_environment: String,
    pub last_clone: Option<DateTime<Utc>>,
    pub age_days: Option<i64>,
    pub is_fresh: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CloneFreshnessResult {
    pub fn skipped(target_environment: &str, source_environment: &str) -> Self {
        Self::undetermined(
            CloneStatus::Skipped,
            target_environment,
            source_environment,
            None,
        )
    }

    /// `not_found`, `error` or `skipped` result with unknown freshness.
    pub fn undetermined(
        status: CloneStatus,
        target_environment: &str,
        source_environment: &str,
        detail: Option<String>,
    ) -> Self {
        Self {
            status,
            target_environment: target_environment.to_string(),
            source_environment: source_environment.to_string(),
            last_clone: None,
            age_days: None,
            is_fresh: None,
            detail,
        }
    }

    /// Check value contributed to the verdict, `None` when skipped.
    pub fn environment_is_fresh(&self) -> Option<bool> {
        match self.status {
            CloneStatus::Skipped => None,
            _ => Some(self.is_fresh == Some(true)),
        }
    }
}

// ---------------------------------------------------------------------------
// Documentation
// ---------------------------------------------------------------------------

/// Canonical documentation fields. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationBundle {
    pub implementation_plan: String,
    pub rollback_plan: String,
    pub test_plan: String,
    pub justification: String,
}

impl DocumentationBundle {
    pub fn checks(&self) -> [(&'static str, bool); 4] {
        [
            ("has_implementation_plan", !self.implementation_plan.is_empty()),
            ("has_rollback_plan", !self.rollback_plan.is_empty()),
            ("has_test_plan", !self.test_plan.is_empty()),
            ("has_justification", !self.justification.is_empty()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Fact bundle
// ---------------------------------------------------------------------------

/// Everything collected for one change, handed to verdict synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactBundle {
    pub change_id: String,
    pub change_number: String,
    pub primary_component: Option<ComponentType>,
    pub label: String,
    /// Selected change-request fields, live when available
    pub change_facts: BTreeMap<String, Value>,
    pub components: Vec<ComponentFactBlock>,
    pub clone_freshness: CloneFreshnessResult,
    pub documentation: DocumentationBundle,
    pub collection_errors: Vec<String>,
}

impl FactBundle {
    /// Flattened check vocabulary shared by both synthesizers.
    ///
    /// A check reported by more than one component passes only if it passes
    /// everywhere.
    pub fn checks(&self) -> BTreeMap<String, bool> {
        let mut checks = BTreeMap::new();
        for block in &self.components {
            for (name, passed) in &block.checks {
                checks
                    .entry(name.clone())
                    .and_modify(|existing: &mut bool| *existing &= *passed)
                    .or_insert(*passed);
            }
        }
        for (name, passed) in self.documentation.checks() {
            checks.insert(name.to_string(), passed);
        }
        if let Some(fresh) = self.clone_freshness.environment_is_fresh() {
            checks.insert("environment_is_fresh".to_string(), fresh);
        }
        checks
    }

    pub fn degraded_components(&self) -> impl Iterator<Item = &ComponentFactBlock> {
        self.components.iter().filter(|block| block.archived)
    }

    /// SHA-256 hex digest of the bundle's canonical JSON.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(component_type: ComponentType) -> ComponentRef {
        ComponentRef {
            component_type,
            id: "abc123".into(),
            label: None,
            primary: true,
        }
    }

    fn bundle(components: Vec<ComponentFactBlock>) -> FactBundle {
        FactBundle {
            change_id: "c1".into(),
            change_number: "CHG0000001".into(),
            primary_component: Some(ComponentType::Workflow),
            label: "Publish workflow".into(),
            change_facts: BTreeMap::new(),
            components,
            clone_freshness: CloneFreshnessResult::skipped("UAT", "PROD"),
            documentation: DocumentationBundle::default(),
            collection_errors: Vec::new(),
        }
    }

    #[test]
    fn archived_block_fails_every_check() {
        let block = ComponentFactBlock::archived(
            &reference(ComponentType::Workflow),
            "wf".into(),
            BTreeMap::new(),
            &["workflow_is_published", "workflow_has_scope"],
            "live lookup failed".into(),
        );
        assert!(block.archived);
        assert_eq!(block.source, FactSource::Archived);
        assert!(block.checks.values().all(|passed| !passed));
        assert_eq!(block.failing_checks().len(), 2);
    }

    #[test]
    fn duplicate_checks_pass_only_if_all_pass() {
        let mut first = ComponentFactBlock::live(
            &reference(ComponentType::ConfigurationItem),
            "ci-1".into(),
            BTreeMap::new(),
            BTreeMap::from([("configuration_item_has_owner".to_string(), true)]),
            Vec::new(),
        );
        let mut second = first.clone();
        second.checks.insert("configuration_item_has_owner".into(), false);
        first.component_id = "ci-0".into();

        let checks = bundle(vec![first, second]).checks();
        assert_eq!(checks.get("configuration_item_has_owner"), Some(&false));
    }

    #[test]
    fn skipped_clone_check_contributes_nothing() {
        let checks = bundle(Vec::new()).checks();
        assert!(!checks.contains_key("environment_is_fresh"));
        assert_eq!(checks.get("has_rollback_plan"), Some(&false));
    }

    #[test]
    fn undetermined_freshness_is_not_fresh() {
        let result = CloneFreshnessResult::undetermined(CloneStatus::Error, "UAT", "PROD", None);
        assert_eq!(result.environment_is_fresh(), Some(false));
    }

    #[test]
    fn digest_is_stable_and_content_sensitive() {
        let a = bundle(Vec::new());
        let mut b = a.clone();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.digest().unwrap().len(), 64);
        b.documentation.test_plan = "run smoke suite".into();
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
