//! Configuration item collector: CMDB record plus relationships.

use serde_json::{json, Value};

use crate::collectors::{display_name, CollectContext, LiveFacts};
use crate::domain::{CollectError, ComponentRef};
use crate::normalize::{normalize_record, present, raw_value, text};

pub const CHECKS: &[&str] = &[
    "configuration_item_is_operational",
    "configuration_item_has_support_group",
    "configuration_item_has_owner",
    "configuration_item_relationships_mapped",
];

const CI_TABLE: &str = "cmdb_ci";
const RELATIONSHIP_SAMPLE: usize = 10;

const CI_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "sys_class_name",
    "operational_status",
    "install_status",
    "support_group",
    "owned_by",
    "managed_by",
    "assigned_to",
    "environment",
];

pub(crate) async fn collect(
    ctx: &CollectContext<'_>,
    reference: &ComponentRef,
) -> Result<LiveFacts, CollectError> {
    let raw = ctx.fetch(CI_TABLE, &reference.id, CI_FIELDS).await?;
    let ci = normalize_record(&raw);
    let relationships = ctx.relationships(&reference.id).await?;

    let mut live = LiveFacts::new(display_name(&ci, reference, &["name"]), ci.clone());
    // display label is localized; raw value 1 is Operational
    let operational = text(&ci, "operational_status")
        .is_some_and(|s| s.eq_ignore_ascii_case("operational"))
        || raw.get("operational_status").and_then(raw_value).as_deref() == Some("1");

    live.check("configuration_item_is_operational", operational);
    live.check(
        "configuration_item_has_support_group",
        present(&ci, "support_group"),
    );
    live.check(
        "configuration_item_has_owner",
        ["owned_by", "managed_by", "assigned_to"]
            .iter()
            .any(|key| present(&ci, key)),
    );
    live.check(
        "configuration_item_relationships_mapped",
        !relationships.is_empty(),
    );

    let sample: Vec<Value> = relationships
        .iter()
        .take(RELATIONSHIP_SAMPLE)
        .map(|row| {
            let row = normalize_record(row);
            json!({
                "type": text(&row, "type"),
                "parent": text(&row, "parent"),
                "child": text(&row, "child"),
            })
        })
        .collect();
    live.facts.insert(
        "relationships".to_string(),
        json!({"count": relationships.len(), "sample": sample}),
    );
    if relationships.is_empty() {
        live.warnings
            .push("configuration item has no mapped relationships".to_string());
    }
    Ok(live)
}
