//! Work-note rendering for the change-management system.

use std::fmt::Write as _;

use change_state::ValidationResult;

use crate::collectors::format_list;
use crate::domain::{CloneStatus, FactBundle, FactSource};

const LIST_LIMIT: usize = 12;

fn mark(passed: bool) -> char {
    if passed {
        '✓'
    } else {
        '✗'
    }
}

/// Plain-text note summarising one verdict and the facts behind it.
pub fn render_work_note(bundle: &FactBundle, result: &ValidationResult) -> String {
    let mut note = String::new();
    let _ = writeln!(
        note,
        "Changegate validation: {} ({})",
        result.overall_status,
        match result.synthesized_by {
            change_state::VerdictSource::ReasoningService => "reasoning service",
            change_state::VerdictSource::RuleBased => "rule-based",
        }
    );
    if !result.synthesis.is_empty() {
        let _ = writeln!(note, "{}", result.synthesis);
    }

    if !bundle.components.is_empty() {
        let _ = writeln!(note, "\nComponents:");
    }
    for block in &bundle.components {
        let failing = block.failing_checks();
        let source = match block.source {
            FactSource::Live => "live",
            FactSource::Archived => "archived",
        };
        let _ = write!(
            note,
            "{} {} {} [{source}]",
            mark(failing.is_empty()),
            block.component_type.label(),
            block.display_name
        );
        if failing.is_empty() {
            let _ = writeln!(note);
        } else {
            let _ = writeln!(note, ": failing {}", format_list(&failing, LIST_LIMIT));
        }
    }

    let warnings: Vec<&String> = bundle
        .components
        .iter()
        .flat_map(|block| block.warnings.iter())
        .chain(bundle.collection_errors.iter())
        .collect();
    if !warnings.is_empty() {
        let _ = writeln!(note, "\nWarnings:");
        for warning in warnings {
            let _ = writeln!(note, "- {warning}");
        }
    }

    let clone = &bundle.clone_freshness;
    if clone.status != CloneStatus::Skipped {
        let age = clone
            .age_days
            .map(|days| format!(", last clone {days} day(s) ago"))
            .unwrap_or_default();
        let _ = writeln!(
            note,
            "\n{} Clone freshness {} from {}: {}{age}",
            mark(clone.is_fresh == Some(true)),
            clone.target_environment,
            clone.source_environment,
            clone.status.as_str()
        );
    }

    let _ = writeln!(note, "\nDocumentation:");
    for (name, present) in bundle.documentation.checks() {
        let label = name.trim_start_matches("has_").replace('_', " ");
        let _ = writeln!(note, "{} {label}", mark(present));
    }

    if !result.risks.is_empty() {
        let _ = writeln!(note, "\nRisks: {}", format_list(&result.risks, LIST_LIMIT));
    }
    if !result.required_actions.is_empty() {
        let _ = writeln!(note, "\nRequired actions:");
        for action in &result.required_actions {
            let _ = writeln!(note, "- {action}");
        }
    }
    if let Some(digest) = &result.fact_digest {
        let _ = writeln!(note, "\nFact digest: {digest}");
    }
    note
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CloneFreshnessResult, ComponentFactBlock, ComponentRef, DocumentationBundle,
    };
    use change_state::{ComponentType, OverallStatus, VerdictSource};
    use std::collections::BTreeMap;

    #[test]
    fn note_lists_components_docs_and_digest() {
        let reference = ComponentRef {
            component_type: ComponentType::Workflow,
            id: "wf1".into(),
            label: None,
            primary: true,
        };
        let block = ComponentFactBlock::archived(
            &reference,
            "Onboarding flow".into(),
            BTreeMap::new(),
            &["workflow_is_published"],
            "Workflow wf1: live lookup unavailable".into(),
        );
        let bundle = FactBundle {
            change_id: "c1".into(),
            change_number: "CHG0000001".into(),
            primary_component: Some(ComponentType::Workflow),
            label: "Publish onboarding flow".into(),
            change_facts: BTreeMap::new(),
            components: vec![block],
            clone_freshness: CloneFreshnessResult::skipped("UAT", "PROD"),
            documentation: DocumentationBundle {
                rollback_plan: "revert".into(),
                ..DocumentationBundle::default()
            },
            collection_errors: Vec::new(),
        };
        let mut result = ValidationResult::new(OverallStatus::Reject, VerdictSource::RuleBased);
        result.required_actions = vec!["Resolve failing check: workflow is published".into()];
        result.fact_digest = Some("deadbeef".into());

        let note = render_work_note(&bundle, &result);
        assert!(note.starts_with("Changegate validation: REJECT (rule-based)"));
        assert!(note.contains("✗ Workflow Onboarding flow [archived]: failing workflow_is_published"));
        assert!(note.contains("- Workflow wf1: live lookup unavailable"));
        assert!(note.contains("✓ rollback plan"));
        assert!(note.contains("✗ test plan"));
        assert!(!note.contains("Clone freshness"));
        assert!(note.contains("Fact digest: deadbeef"));
    }
}
