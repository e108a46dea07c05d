//! Middleware agent (MID server) collector.

use serde_json::Value;

use crate::collectors::{display_name, CollectContext, LiveFacts};
use crate::domain::{CollectError, ComponentRef};
use crate::normalize::{flag, normalize_record, present, text};

pub const CHECKS: &[&str] = &[
    "middleware_agent_is_up",
    "middleware_agent_is_validated",
    "middleware_agent_has_host",
    "middleware_agent_version_reported",
];

const AGENT_TABLE: &str = "ecc_agent";
const CAPABILITY_TABLE: &str = "ecc_agent_capability_m2m";
const CAPABILITY_LIMIT: usize = 50;

const AGENT_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "status",
    "validated",
    "host_name",
    "ip_address",
    "version",
    "last_refreshed",
];
const CAPABILITY_FIELDS: &[&str] = &["capability", "agent"];

pub(crate) async fn collect(
    ctx: &CollectContext<'_>,
    reference: &ComponentRef,
) -> Result<LiveFacts, CollectError> {
    let raw = ctx.fetch(AGENT_TABLE, &reference.id, AGENT_FIELDS).await?;
    let agent = normalize_record(&raw);
    let query = format!("agent={}", reference.id);
    let capabilities: Vec<String> = ctx
        .query(CAPABILITY_TABLE, &query, CAPABILITY_LIMIT, CAPABILITY_FIELDS)
        .await?
        .iter()
        .map(normalize_record)
        .filter_map(|row| text(&row, "capability"))
        .collect();

    let mut live = LiveFacts::new(display_name(&agent, reference, &["name"]), agent.clone());
    let status = text(&agent, "status").unwrap_or_default();
    let validated = flag(&agent, "validated") == Some(true)
        || text(&agent, "validated").is_some_and(|v| v.eq_ignore_ascii_case("validated"));

    live.check("middleware_agent_is_up", status.eq_ignore_ascii_case("up"));
    live.check("middleware_agent_is_validated", validated);
    live.check(
        "middleware_agent_has_host",
        present(&agent, "host_name") || present(&agent, "ip_address"),
    );
    live.check(
        "middleware_agent_version_reported",
        present(&agent, "version"),
    );

    if !status.eq_ignore_ascii_case("up") {
        let shown = if status.is_empty() { "unknown" } else { status.as_str() };
        live.warnings
            .push(format!("middleware agent status is {shown}"));
    }
    if capabilities.is_empty() {
        live.warnings
            .push("middleware agent reports no capabilities".to_string());
    }
    live.facts.insert(
        "capabilities".to_string(),
        Value::Array(capabilities.into_iter().map(Value::String).collect()),
    );
    Ok(live)
}
