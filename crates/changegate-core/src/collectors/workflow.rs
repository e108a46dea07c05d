//! Workflow collector: workflow record plus its latest version.

use serde_json::Value;

use crate::collectors::{display_name, CollectContext, LiveFacts};
use crate::domain::{CollectError, ComponentRef};
use crate::normalize::{flag, normalize_record, present};

pub const CHECKS: &[&str] = &[
    "workflow_is_published",
    "workflow_not_checked_out",
    "workflow_has_scope",
    "workflow_is_active",
];

const WORKFLOW_TABLE: &str = "wf_workflow";
const VERSION_TABLE: &str = "wf_workflow_version";

const WORKFLOW_FIELDS: &[&str] = &["sys_id", "name", "description", "sys_scope", "table"];
const VERSION_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "published",
    "checked_out",
    "checked_out_by",
    "active",
    "sys_scope",
    "sys_updated_on",
];

pub(crate) async fn collect(
    ctx: &CollectContext<'_>,
    reference: &ComponentRef,
) -> Result<LiveFacts, CollectError> {
    let raw = ctx.fetch(WORKFLOW_TABLE, &reference.id, WORKFLOW_FIELDS).await?;
    let workflow = normalize_record(&raw);
    let query = format!("workflow={}^ORDERBYDESCsys_updated_on", reference.id);
    let versions = ctx.query(VERSION_TABLE, &query, 1, VERSION_FIELDS).await?;

    let mut live = LiveFacts::new(
        display_name(&workflow, reference, &["name"]),
        workflow.clone(),
    );
    let has_scope = present(&workflow, "sys_scope");

    let Some(latest) = versions.first() else {
        live.warnings
            .push("no workflow version found; publication state unknown".to_string());
        live.check("workflow_has_scope", has_scope);
        return Ok(live);
    };

    let version = normalize_record(latest);
    live.check("workflow_is_published", flag(&version, "published") == Some(true));
    let checked_out = present(&version, "checked_out") || present(&version, "checked_out_by");
    live.check("workflow_not_checked_out", !checked_out);
    live.check(
        "workflow_has_scope",
        has_scope || present(&version, "sys_scope"),
    );
    live.check(
        "workflow_is_active",
        flag(&version, "active").or_else(|| flag(&workflow, "active")) == Some(true),
    );
    if checked_out {
        live.warnings
            .push("latest workflow version is checked out".to_string());
    }
    live.facts.insert(
        "latest_version".to_string(),
        Value::Object(version.into_iter().collect()),
    );
    Ok(live)
}
