//! Configuration template collector: template → record producer → category.

use serde_json::Value;

use crate::collectors::{display_name, CollectContext, LiveFacts};
use crate::domain::{CollectError, ComponentRef};
use crate::normalize::{flag, normalize_record, present, raw_value};

pub const CHECKS: &[&str] = &[
    "template_is_active",
    "template_has_target_table",
    "template_has_content",
    "template_has_producer",
    "template_producer_is_active",
    "template_category_active",
];

const TEMPLATE_TABLE: &str = "sys_template";
const PRODUCER_TABLE: &str = "sc_cat_item_producer";
const CATEGORY_TABLE: &str = "sc_category";

const TEMPLATE_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "active",
    "table",
    "template",
    "short_description",
    "record_producer",
    "sys_updated_on",
];
const PRODUCER_FIELDS: &[&str] = &["sys_id", "name", "active", "category", "table_name"];
const CATEGORY_FIELDS: &[&str] = &["sys_id", "title", "active"];

pub(crate) async fn collect(
    ctx: &CollectContext<'_>,
    reference: &ComponentRef,
    payload: &Value,
) -> Result<LiveFacts, CollectError> {
    let raw = ctx.fetch(TEMPLATE_TABLE, &reference.id, TEMPLATE_FIELDS).await?;
    let record = normalize_record(&raw);

    let mut live = LiveFacts::new(display_name(&record, reference, &["name"]), record.clone());
    live.check("template_is_active", flag(&record, "active") == Some(true));
    live.check("template_has_target_table", present(&record, "table"));
    live.check("template_has_content", present(&record, "template"));

    let producer_id = raw
        .get("record_producer")
        .and_then(raw_value)
        .or_else(|| payload.get("producer").and_then(raw_value));
    let Some(producer_id) = producer_id else {
        live.warnings
            .push("template is not linked to a record producer".to_string());
        live.check("template_has_producer", false);
        return Ok(live);
    };

    let raw_producer = ctx.fetch(PRODUCER_TABLE, &producer_id, PRODUCER_FIELDS).await?;
    let producer = normalize_record(&raw_producer);
    live.check("template_has_producer", true);
    live.check(
        "template_producer_is_active",
        flag(&producer, "active") == Some(true),
    );
    live.facts.insert(
        "producer".to_string(),
        Value::Object(producer.into_iter().collect()),
    );

    match raw_producer.get("category").and_then(raw_value) {
        Some(category_id) => {
            let raw_category = ctx.fetch(CATEGORY_TABLE, &category_id, CATEGORY_FIELDS).await?;
            let category = normalize_record(&raw_category);
            live.check(
                "template_category_active",
                flag(&category, "active") == Some(true),
            );
            live.facts.insert(
                "category".to_string(),
                Value::Object(category.into_iter().collect()),
            );
        }
        None => live
            .warnings
            .push("record producer has no catalog category".to_string()),
    }
    Ok(live)
}
