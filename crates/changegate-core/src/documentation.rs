//! Documentation reconciliation across live and archived field names.

use serde_json::Value;

use crate::domain::DocumentationBundle;
use crate::normalize::display_text;

struct DocField {
    primary: &'static str,
    aliases: &'static [&'static str],
}

const IMPLEMENTATION_PLAN: DocField = DocField {
    primary: "implementation_plan",
    aliases: &["u_implementation_plan", "implementation_steps"],
};
const ROLLBACK_PLAN: DocField = DocField {
    primary: "backout_plan",
    aliases: &["rollback_plan", "u_rollback_plan"],
};
const TEST_PLAN: DocField = DocField {
    primary: "test_plan",
    aliases: &["u_test_plan", "testing_plan"],
};
const JUSTIFICATION: DocField = DocField {
    primary: "justification",
    aliases: &["business_justification", "u_justification"],
};

fn lookup(source: Option<&Value>, name: &str) -> Option<String> {
    source?.get(name).and_then(display_text)
}

/// Resolution order: live primary, live aliases, archived primary, archived
/// aliases. First non-empty trimmed value wins; otherwise empty string.
fn resolve(field: &DocField, live: Option<&Value>, archived: &Value) -> String {
    [live, Some(archived)]
        .into_iter()
        .find_map(|source| {
            std::iter::once(field.primary)
                .chain(field.aliases.iter().copied())
                .find_map(|name| lookup(source, name))
        })
        .unwrap_or_default()
}

/// Merge the live change record with the archived webhook payload.
pub fn reconcile_documentation(live: Option<&Value>, archived: &Value) -> DocumentationBundle {
    DocumentationBundle {
        implementation_plan: resolve(&IMPLEMENTATION_PLAN, live, archived),
        rollback_plan: resolve(&ROLLBACK_PLAN, live, archived),
        test_plan: resolve(&TEST_PLAN, live, archived),
        justification: resolve(&JUSTIFICATION, live, archived),
    }
}
