//! Directory (LDAP) server collector: server config plus its URLs.

use serde_json::Value;

use crate::collectors::{display_name, CollectContext, LiveFacts};
use crate::domain::{CollectError, ComponentRef};
use crate::normalize::{flag, normalize_record, text};

pub const CHECKS: &[&str] = &[
    "directory_server_is_active",
    "directory_server_has_url",
    "directory_server_is_operational",
    "directory_server_uses_ssl",
];

const SERVER_TABLE: &str = "ldap_server_config";
const URL_TABLE: &str = "ldap_server_url";
const URL_LIMIT: usize = 20;

const SERVER_FIELDS: &[&str] = &["sys_id", "name", "active", "ssl", "dn", "sys_updated_on"];
const URL_FIELDS: &[&str] = &["sys_id", "url", "active", "operational_status", "order"];

fn is_operational(status: Option<String>) -> bool {
    matches!(
        status.map(|s| s.to_ascii_lowercase()).as_deref(),
        Some("true" | "operational" | "up" | "1")
    )
}

pub(crate) async fn collect(
    ctx: &CollectContext<'_>,
    reference: &ComponentRef,
) -> Result<LiveFacts, CollectError> {
    let raw = ctx.fetch(SERVER_TABLE, &reference.id, SERVER_FIELDS).await?;
    let server = normalize_record(&raw);
    let query = format!("server={}^ORDERBYorder", reference.id);
    let urls: Vec<_> = ctx
        .query(URL_TABLE, &query, URL_LIMIT, URL_FIELDS)
        .await?
        .iter()
        .map(normalize_record)
        .collect();

    let mut live = LiveFacts::new(display_name(&server, reference, &["name"]), server.clone());
    let active_urls: Vec<String> = urls
        .iter()
        .filter(|row| flag(row, "active") != Some(false))
        .filter_map(|row| text(row, "url"))
        .collect();
    let operational = urls
        .iter()
        .filter(|row| flag(row, "active") != Some(false))
        .any(|row| is_operational(text(row, "operational_status")));
    let all_ldaps = !active_urls.is_empty()
        && active_urls
            .iter()
            .all(|url| url.to_ascii_lowercase().starts_with("ldaps://"));

    live.check("directory_server_is_active", flag(&server, "active") == Some(true));
    live.check("directory_server_has_url", !active_urls.is_empty());
    live.check("directory_server_is_operational", operational);
    live.check(
        "directory_server_uses_ssl",
        flag(&server, "ssl") == Some(true) || all_ldaps,
    );

    if active_urls.is_empty() {
        live.warnings
            .push("directory server has no active URLs".to_string());
    } else if !operational {
        live.warnings
            .push("no directory server URL reports an operational status".to_string());
    }
    live.facts.insert(
        "urls".to_string(),
        Value::Array(active_urls.into_iter().map(Value::String).collect()),
    );
    Ok(live)
}
