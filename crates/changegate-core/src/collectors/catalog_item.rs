//! Catalog item collector: item record plus its variables.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::collectors::{display_name, format_list, CollectContext, LiveFacts};
use crate::domain::{CollectError, ComponentRef};
use crate::normalize::{flag, normalize_record, present, text};

pub const CHECKS: &[&str] = &[
    "catalog_item_is_active",
    "catalog_item_has_short_description",
    "catalog_item_has_workflow",
    "catalog_item_has_category",
    "catalog_item_has_variable_questions",
    "catalog_item_name_clean",
    "catalog_item_description_quality",
    "catalog_item_media_present",
    "catalog_item_variable_help_text",
];

const ITEM_TABLE: &str = "sc_cat_item";
const VARIABLE_TABLE: &str = "item_option_new";
const VARIABLE_LIMIT: usize = 200;
const LIST_LIMIT: usize = 12;

const PROHIBITED_NAME_TOKENS: [&str; 4] = ["copy of", "template", "draft", "test"];
const WEAK_DESCRIPTION_TOKENS: [&str; 4] = ["tbd", "lorem", "test", "sample"];
const MIN_DESCRIPTION_LEN: usize = 15;

const ITEM_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "short_description",
    "active",
    "category",
    "sc_catalogs",
    "workflow",
    "flow_designer_flow",
    "icon",
    "picture",
    "sys_updated_on",
];
const VARIABLE_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "question_text",
    "mandatory",
    "active",
    "help_text",
    "instructions",
    "type",
];

pub(crate) async fn collect(
    ctx: &CollectContext<'_>,
    reference: &ComponentRef,
) -> Result<LiveFacts, CollectError> {
    let raw = ctx.fetch(ITEM_TABLE, &reference.id, ITEM_FIELDS).await?;
    let item = normalize_record(&raw);
    let query = format!("cat_item={}^ORDERBYorder", reference.id);
    let variables: Vec<BTreeMap<String, Value>> = ctx
        .query(VARIABLE_TABLE, &query, VARIABLE_LIMIT, VARIABLE_FIELDS)
        .await?
        .iter()
        .map(normalize_record)
        .collect();

    let mut live = LiveFacts::new(display_name(&item, reference, &["name"]), item.clone());
    let summary = VariableSummary::from_variables(&variables);

    live.check("catalog_item_is_active", flag(&item, "active") == Some(true));
    live.check(
        "catalog_item_has_short_description",
        present(&item, "short_description"),
    );
    live.check(
        "catalog_item_has_workflow",
        present(&item, "workflow") || present(&item, "flow_designer_flow"),
    );
    live.check("catalog_item_has_category", present(&item, "category"));
    live.check(
        "catalog_item_has_variable_questions",
        summary.missing_question.is_empty(),
    );

    let name = text(&item, "name").unwrap_or_default().to_lowercase();
    let prohibited = PROHIBITED_NAME_TOKENS
        .iter()
        .find(|token| name.contains(**token));
    if let Some(token) = prohibited {
        live.warnings
            .push(format!("display name contains prohibited token '{token}'"));
    }
    live.check("catalog_item_name_clean", prohibited.is_none());

    let description = text(&item, "short_description").unwrap_or_default();
    let lower = description.to_lowercase();
    let description_ok = description.chars().count() >= MIN_DESCRIPTION_LEN
        && !WEAK_DESCRIPTION_TOKENS.iter().any(|t| lower.contains(t));
    live.check("catalog_item_description_quality", description_ok);

    live.check(
        "catalog_item_media_present",
        present(&item, "icon") || present(&item, "picture"),
    );
    live.check(
        "catalog_item_variable_help_text",
        summary.mandatory_missing_help.is_empty(),
    );

    if variables.is_empty() {
        live.warnings
            .push("catalog item has no variables defined".to_string());
    }
    if !summary.missing_question.is_empty() {
        live.warnings.push(format!(
            "variables missing question text: {}",
            format_list(&summary.missing_question, LIST_LIMIT)
        ));
    }
    if !summary.inactive.is_empty() {
        live.warnings.push(format!(
            "inactive variables: {}",
            format_list(&summary.inactive, LIST_LIMIT)
        ));
    }
    if !summary.mandatory_missing_help.is_empty() {
        live.warnings.push(format!(
            "mandatory variables missing help text: {}",
            format_list(&summary.mandatory_missing_help, LIST_LIMIT)
        ));
    }

    live.facts
        .insert("variable_summary".to_string(), summary.to_json());
    Ok(live)
}

#[derive(Debug, Default)]
struct VariableSummary {
    total: usize,
    mandatory: usize,
    inactive: Vec<String>,
    missing_question: Vec<String>,
    mandatory_missing_help: Vec<String>,
    sample_names: Vec<String>,
}

impl VariableSummary {
    fn from_variables(variables: &[BTreeMap<String, Value>]) -> Self {
        let mut summary = Self {
            total: variables.len(),
            ..Self::default()
        };
        for (index, var) in variables.iter().enumerate() {
            let name = text(var, "name").unwrap_or_else(|| format!("variable #{}", index + 1));
            let mandatory = flag(var, "mandatory") == Some(true);
            if mandatory {
                summary.mandatory += 1;
                if !present(var, "help_text") && !present(var, "instructions") {
                    summary.mandatory_missing_help.push(name.clone());
                }
            }
            if flag(var, "active") == Some(false) {
                summary.inactive.push(name.clone());
            }
            if !present(var, "question_text") {
                summary.missing_question.push(name.clone());
            }
            if summary.sample_names.len() < 5 {
                summary.sample_names.push(name);
            }
        }
        summary
    }

    fn to_json(&self) -> Value {
        json!({
            "total": self.total,
            "mandatory": self.mandatory,
            "inactive": self.inactive.len(),
            "missing_question_text": self.missing_question.len(),
            "mandatory_missing_help": self.mandatory_missing_help.len(),
            "sample_names": self.sample_names,
        })
    }
}
