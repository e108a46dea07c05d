//! Deterministic rule-based verdict.
//!
//! Pure over the checks map: no I/O, no clock, no randomness. Checks whose
//! name contains `has_` or `is_` are critical.

use std::collections::BTreeMap;

use change_state::{OverallStatus, ValidationResult, VerdictSource};

const DOCUMENTATION_CHECKS: [(&str, &str); 4] = [
    ("has_implementation_plan", "implementation plan"),
    ("has_rollback_plan", "rollback plan"),
    ("has_test_plan", "test plan"),
    ("has_justification", "justification"),
];

pub fn is_critical_check(name: &str) -> bool {
    name.contains("has_") || name.contains("is_")
}

/// `workflow_is_published` → `workflow is published`
pub fn describe_check(name: &str) -> String {
    name.replace('_', " ")
}

/// Required action for a failing check.
pub fn remediation_for(name: &str) -> String {
    format!("Resolve failing check: {}", describe_check(name))
}

fn documentation_assessment(checks: &BTreeMap<String, bool>) -> String {
    let observed: Vec<(&str, bool)> = DOCUMENTATION_CHECKS
        .iter()
        .filter_map(|(name, label)| checks.get(*name).map(|passed| (*label, *passed)))
        .collect();
    if observed.is_empty() {
        return "Documentation was not evaluated.".to_string();
    }
    let missing: Vec<&str> = observed
        .iter()
        .filter(|(_, passed)| !passed)
        .map(|(label, _)| *label)
        .collect();
    if missing.is_empty() {
        "All required documentation fields are present.".to_string()
    } else {
        format!("Missing documentation: {}.", missing.join(", "))
    }
}

/// Verdict derived only from `checks`.
///
/// REJECT if any critical check fails, APPROVE_WITH_CONDITIONS if only
/// non-critical checks fail, APPROVE otherwise. An empty map is a REJECT:
/// nothing was observed.
pub fn rule_based_verdict(checks: &BTreeMap<String, bool>) -> ValidationResult {
    let (critical_failures, other_failures): (Vec<&str>, Vec<&str>) = checks
        .iter()
        .filter(|(_, passed)| !**passed)
        .map(|(name, _)| name.as_str())
        .partition(|name| is_critical_check(name));

    let overall_status = if checks.is_empty() || !critical_failures.is_empty() {
        OverallStatus::Reject
    } else if !other_failures.is_empty() {
        OverallStatus::ApproveWithConditions
    } else {
        OverallStatus::Approve
    };

    let mut result = ValidationResult::new(overall_status, VerdictSource::RuleBased);
    result.documentation_assessment = documentation_assessment(checks);
    result.risks = other_failures
        .iter()
        .map(|name| format!("Non-critical check failed: {}", describe_check(name)))
        .collect();
    result.required_actions = critical_failures
        .iter()
        .chain(other_failures.iter())
        .map(|name| remediation_for(name))
        .collect();
    if checks.is_empty() {
        result
            .required_actions
            .push("No validation checks could be evaluated; collect facts and re-run validation.".to_string());
    }

    let passed = checks.values().filter(|passed| **passed).count();
    result.synthesis = format!(
        "Rule-based verdict {}: {passed} of {} checks passed, {} critical failure(s), {} non-critical failure(s).",
        overall_status,
        checks.len(),
        critical_failures.len(),
        other_failures.len()
    );
    result.checks = Some(checks.clone());
    result
}
