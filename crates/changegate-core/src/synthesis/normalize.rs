//! Verdict normalization applied to every synthesized result.

use change_state::{OverallStatus, ValidationResult};

use crate::synthesis::fallback::{is_critical_check, remediation_for};

const DEFAULT_ASSESSMENT: &str = "No documentation assessment provided.";

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

fn default_synthesis(status: OverallStatus) -> String {
    format!("Verdict {status} recorded without a narrative synthesis.")
}

fn default_actions(result: &ValidationResult) -> Vec<String> {
    let failing: Vec<&String> = result
        .checks
        .iter()
        .flatten()
        .filter(|(_, passed)| !**passed)
        .map(|(name, _)| name)
        .collect();
    let mut actions: Vec<String> = failing
        .iter()
        .filter(|name| is_critical_check(name))
        .chain(failing.iter().filter(|name| !is_critical_check(name)))
        .map(|name| remediation_for(name))
        .collect();
    if actions.is_empty() {
        actions.push(match result.overall_status {
            OverallStatus::ApproveWithConditions => {
                "Address the conditions noted in the validation findings before implementation."
            }
            _ => "Review the validation findings and remediate before resubmitting the change.",
        }
        .to_string());
    }
    actions
}

/// Fill safe defaults and enforce "non-APPROVE carries at least one required
/// action". Idempotent. Never changes `overall_status`, `synthesized_by` or
/// `fact_digest`.
pub fn normalize_verdict(mut result: ValidationResult) -> ValidationResult {
    result.documentation_assessment = result.documentation_assessment.trim().to_string();
    if result.documentation_assessment.is_empty() {
        result.documentation_assessment = DEFAULT_ASSESSMENT.to_string();
    }
    result.synthesis = result.synthesis.trim().to_string();
    if result.synthesis.is_empty() {
        result.synthesis = default_synthesis(result.overall_status);
    }
    result.risks = clean_list(std::mem::take(&mut result.risks));
    result.required_actions = clean_list(std::mem::take(&mut result.required_actions));

    if result.overall_status != OverallStatus::Approve && result.required_actions.is_empty() {
        result.required_actions = default_actions(&result);
    }
    result
}
