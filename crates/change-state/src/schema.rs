//! Record and verdict schema.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Component types
// ---------------------------------------------------------------------------

/// The kind of artifact a change request affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Template,
    CatalogItem,
    Workflow,
    DirectoryServer,
    MiddlewareAgent,
    ConfigurationItem,
}

impl ComponentType {
    /// Every component type, in collection order.
    pub const ALL: [ComponentType; 6] = [
        ComponentType::Template,
        ComponentType::CatalogItem,
        ComponentType::Workflow,
        ComponentType::DirectoryServer,
        ComponentType::MiddlewareAgent,
        ComponentType::ConfigurationItem,
    ];

    /// Stable snake_case key, also used as the check-name prefix.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::CatalogItem => "catalog_item",
            Self::Workflow => "workflow",
            Self::DirectoryServer => "directory_server",
            Self::MiddlewareAgent => "middleware_agent",
            Self::ConfigurationItem => "configuration_item",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Template => "Template",
            Self::CatalogItem => "Catalog Item",
            Self::Workflow => "Workflow",
            Self::DirectoryServer => "Directory Server",
            Self::MiddlewareAgent => "Middleware Agent",
            Self::ConfigurationItem => "Configuration Item",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for ComponentType {
    type Err = String;

    /// Accepts the snake_case key, the human label, and the source table
    /// names the webhook sender has been seen to use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let parsed = match normalized.as_str() {
            "template" | "sys_template" | "configuration_template" => Self::Template,
            "catalog_item" | "sc_cat_item" | "cat_item" => Self::CatalogItem,
            "workflow" | "wf_workflow" => Self::Workflow,
            "directory_server" | "ldap_server" | "ldap_server_config" => Self::DirectoryServer,
            "middleware_agent" | "mid_server" | "ecc_agent" => Self::MiddlewareAgent,
            "configuration_item" | "cmdb_ci" | "ci" => Self::ConfigurationItem,
            _ => return Err(format!("unknown component type: {s}")),
        };
        Ok(parsed)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of a validation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Received,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One change request under review.
///
/// Created when the webhook arrives and mutated only by the validation
/// pipeline afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeValidationRecord {
    /// Record identifier (distinct from the change's own id)
    pub id: String,
    /// Change request id in the change-management system
    pub change_id: String,
    /// Human-readable change number (e.g. CHG0031234)
    pub change_number: String,
    /// Component type detected at ingestion, if any
    pub component_type: Option<ComponentType>,
    /// Id of the primary component
    pub component_id: Option<String>,
    /// Raw webhook payload, including archived documentation fields
    pub payload: serde_json::Value,
    pub status: ValidationStatus,
    pub verdict: Option<ValidationResult>,
    pub failure_reason: Option<String>,
    /// Number of times processing was restarted after the first attempt
    pub retry_count: u32,
    /// Wall-clock processing time of the last finished run
    pub processing_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChangeValidationRecord {
    /// Create a freshly received record.
    pub fn new(
        change_id: impl Into<String>,
        change_number: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            change_id: change_id.into(),
            change_number: change_number.into(),
            component_type: None,
            component_id: None,
            payload,
            status: ValidationStatus::Received,
            verdict: None,
            failure_reason: None,
            retry_count: 0,
            processing_ms: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the detected primary component.
    pub fn with_component(mut self, component_type: ComponentType, id: impl Into<String>) -> Self {
        self.component_type = Some(component_type);
        self.component_id = Some(id.into());
        self
    }

    /// Short description carried in the payload, if present as a string.
    pub fn short_description(&self) -> Option<&str> {
        self.payload
            .get("short_description")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Overall verdict of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Approve,
    ApproveWithConditions,
    Reject,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::ApproveWithConditions => "APPROVE_WITH_CONDITIONS",
            Self::Reject => "REJECT",
        }
    }

    /// Lenient parse of free-form status text.
    ///
    /// Returns `None` for anything that is not recognisably one of the three
    /// verdicts.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_ascii_uppercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let normalized = normalized.trim_matches('_');
        match normalized {
            "APPROVE" | "APPROVED" | "PASS" | "PASSED" => Some(Self::Approve),
            "APPROVE_WITH_CONDITIONS" | "APPROVED_WITH_CONDITIONS" | "CONDITIONAL_APPROVAL"
            | "CONDITIONAL" | "PASSED_WITH_WARNINGS" => Some(Self::ApproveWithConditions),
            "REJECT" | "REJECTED" | "FAIL" | "FAILED" => Some(Self::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which synthesizer produced a verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    ReasoningService,
    #[default]
    RuleBased,
}

/// Final structured verdict for one change.
///
/// # Invariants
///
/// Any `overall_status` other than `Approve` carries at least one entry in
/// `required_actions` once the result has been normalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub overall_status: OverallStatus,
    pub documentation_assessment: String,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub required_actions: Vec<String>,
    #[serde(default)]
    pub synthesis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<BTreeMap<String, bool>>,
    #[serde(default)]
    pub synthesized_by: VerdictSource,
    /// SHA-256 of the fact bundle the verdict was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_digest: Option<String>,
}

impl ValidationResult {
    /// Create a result with empty narrative fields.
    pub fn new(overall_status: OverallStatus, synthesized_by: VerdictSource) -> Self {
        Self {
            overall_status,
            documentation_assessment: String::new(),
            risks: Vec::new(),
            required_actions: Vec::new(),
            synthesis: String::new(),
            checks: None,
            synthesized_by,
            fact_digest: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_type_parses_table_names_and_labels() {
        assert_eq!("sc_cat_item".parse::<ComponentType>(), Ok(ComponentType::CatalogItem));
        assert_eq!("Catalog Item".parse::<ComponentType>(), Ok(ComponentType::CatalogItem));
        assert_eq!("mid_server".parse::<ComponentType>(), Ok(ComponentType::MiddlewareAgent));
        assert_eq!("LDAP-Server".parse::<ComponentType>(), Ok(ComponentType::DirectoryServer));
        assert_eq!("cmdb_ci".parse::<ComponentType>(), Ok(ComponentType::ConfigurationItem));
        assert!("widget".parse::<ComponentType>().is_err());
    }

    #[test]
    fn component_type_serializes_as_key() {
        for ct in ComponentType::ALL {
            let json = serde_json::to_value(ct).unwrap();
            assert_eq!(json, serde_json::json!(ct.key()));
        }
    }

    #[test]
    fn overall_status_parses_common_variants() {
        assert_eq!(OverallStatus::parse_lenient("approve"), Some(OverallStatus::Approve));
        assert_eq!(
            OverallStatus::parse_lenient("Approve with conditions"),
            Some(OverallStatus::ApproveWithConditions)
        );
        assert_eq!(OverallStatus::parse_lenient(" REJECTED "), Some(OverallStatus::Reject));
        assert_eq!(OverallStatus::parse_lenient("maybe"), None);
    }

    #[test]
    fn overall_status_wire_format() {
        let json = serde_json::to_string(&OverallStatus::ApproveWithConditions).unwrap();
        assert_eq!(json, "\"APPROVE_WITH_CONDITIONS\"");
    }

    #[test]
    fn validation_result_deserializes_with_defaults() {
        let result: ValidationResult = serde_json::from_value(serde_json::json!({
            "overall_status": "REJECT",
            "documentation_assessment": "missing rollback plan"
        }))
        .unwrap();
        assert_eq!(result.overall_status, OverallStatus::Reject);
        assert!(result.required_actions.is_empty());
        assert_eq!(result.synthesized_by, VerdictSource::RuleBased);
    }

    #[test]
    fn record_short_description_ignores_blank() {
        let record = ChangeValidationRecord::new(
            "abc",
            "CHG0000001",
            serde_json::json!({"short_description": "   "}),
        );
        assert_eq!(record.short_description(), None);
        assert_eq!(record.status, ValidationStatus::Received);
    }
}
