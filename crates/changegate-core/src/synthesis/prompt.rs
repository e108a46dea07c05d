//! Prompt assembly for the reasoning service.

use std::fmt::Write as _;

use crate::domain::FactBundle;

/// System framing sent with every request.
pub const SYSTEM_FRAMING: &str = "You review infrastructure change requests before they are \
allowed to proceed. You receive facts collected from the change-management system. Facts \
marked as archived could not be observed live and must be treated as unverified; their checks \
are failing. Absence of information is never evidence that a property holds. Decide one of \
APPROVE, APPROVE_WITH_CONDITIONS or REJECT. Any verdict other than APPROVE must list at least \
one required action.";

const RESPONSE_SHAPE: &str = r#"{
  "overall_status": "APPROVE | APPROVE_WITH_CONDITIONS | REJECT",
  "documentation_assessment": "string",
  "risks": ["string"],
  "required_actions": ["string"],
  "synthesis": "string"
}"#;

/// User prompt for one fact bundle.
pub fn build_prompt(bundle: &FactBundle) -> Result<String, serde_json::Error> {
    let facts = serde_json::to_string_pretty(bundle)?;
    let checks = serde_json::to_string_pretty(&bundle.checks())?;

    let mut prompt = String::with_capacity(facts.len() + checks.len() + 512);
    let _ = writeln!(
        prompt,
        "Change {} ({}) needs a validation verdict.",
        bundle.change_number, bundle.label
    );
    let degraded = bundle.degraded_components().count();
    if degraded > 0 {
        let _ = writeln!(
            prompt,
            "{degraded} component(s) could not be read live and were filled from the archived submission."
        );
    }
    if !bundle.collection_errors.is_empty() {
        let _ = writeln!(prompt, "Collection errors: {}", bundle.collection_errors.join("; "));
    }
    let _ = writeln!(prompt, "\nFact bundle:\n```json\n{facts}\n```");
    let _ = writeln!(prompt, "\nCheck results (false means failing or unknown):\n```json\n{checks}\n```");
    let _ = writeln!(
        prompt,
        "\nRespond with exactly one JSON object of this shape and nothing else:\n```json\n{RESPONSE_SHAPE}\n```"
    );
    Ok(prompt)
}
