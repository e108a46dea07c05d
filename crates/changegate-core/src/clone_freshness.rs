//! Environment clone-freshness check.
//!
//! Applies only to changes whose primary component type is configured and
//! whose label contains the configured phrase (case-insensitive). Everything
//! else is `skipped` without touching the network.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument};

use change_api::ChangeManagementApi;
use change_state::ComponentType;

use crate::config::CloneCheckConfig;
use crate::domain::{CloneFreshnessResult, CloneStatus};
use crate::normalize::raw_value;
use crate::timeout::with_timeout;

const HISTORY_TABLE: &str = "sys_clone_history";
const REQUEST_TABLE: &str = "sn_instance_clone_request";
const HISTORY_FIELDS: &[&str] = &[
    "sys_id",
    "source_instance",
    "target_instance",
    "state",
    "sys_created_on",
    "last_completed_time",
];
const REQUEST_FIELDS: &[&str] = &[
    "sys_id",
    "target_instance",
    "source_instance",
    "state",
    "sys_created_on",
    "completed",
    "started",
];
const TIMESTAMP_FIELDS: [&str; 3] = ["last_completed_time", "completed", "sys_created_on"];

/// Whether a change belongs to the clone-checked family.
pub fn is_applicable(
    config: &CloneCheckConfig,
    component_type: Option<ComponentType>,
    label: &str,
) -> bool {
    let Some(component_type) = component_type else {
        return false;
    };
    let phrase = config.phrase.trim().to_lowercase();
    !phrase.is_empty()
        && config.component_types.contains(&component_type)
        && label.to_lowercase().contains(&phrase)
}

/// Gate on applicability, then run the check.
pub async fn evaluate(
    api: &dyn ChangeManagementApi,
    config: &CloneCheckConfig,
    timeout: Duration,
    component_type: Option<ComponentType>,
    label: &str,
    now: DateTime<Utc>,
) -> CloneFreshnessResult {
    if !is_applicable(config, component_type, label) {
        debug!(label = %label, "clone freshness check not applicable");
        return CloneFreshnessResult::skipped(
            &config.target_environment,
            &config.source_environment,
        );
    }
    check_clone_freshness(api, config, timeout, now).await
}

/// Look up the latest completed clone into the target and classify its age.
///
/// `api` must point at the source environment's instance, which records
/// the clones it pushed out.
#[instrument(skip(api, config, timeout, now), fields(target = %config.target_environment))]
pub async fn check_clone_freshness(
    api: &dyn ChangeManagementApi,
    config: &CloneCheckConfig,
    timeout: Duration,
    now: DateTime<Utc>,
) -> CloneFreshnessResult {
    let undetermined = |status: CloneStatus, detail: String| {
        CloneFreshnessResult::undetermined(
            status,
            &config.target_environment,
            &config.source_environment,
            Some(detail),
        )
    };

    let record = match with_timeout(latest_clone_record(api, config), timeout, "clone lineage").await
    {
        None => {
            return undetermined(
                CloneStatus::Error,
                format!("clone lineage lookup timed out after {} ms", timeout.as_millis()),
            )
        }
        Some(Err(err)) => {
            return undetermined(CloneStatus::Error, format!("clone lineage lookup failed: {err}"))
        }
        Some(Ok(None)) => {
            return undetermined(
                CloneStatus::NotFound,
                format!("no clone history found for target '{}'", config.target_instance()),
            )
        }
        Some(Ok(Some(record))) => record,
    };

    let Some(last_clone) = clone_timestamp(&record) else {
        return undetermined(
            CloneStatus::Error,
            "clone record is missing a usable timestamp".to_string(),
        );
    };
    let result = classify(config, last_clone, now);
    info!(
        status = result.status.as_str(),
        age_days = result.age_days,
        "clone freshness evaluated"
    );
    result
}

async fn latest_clone_record(
    api: &dyn ChangeManagementApi,
    config: &CloneCheckConfig,
) -> change_api::Result<Option<Value>> {
    let target = config.target_instance();
    let query = format!("target_instance={target}^state=completed^ORDERBYDESClast_completed_time");
    match api.query_table(HISTORY_TABLE, &query, 1, HISTORY_FIELDS).await {
        Ok(rows) => return Ok(rows.into_iter().next()),
        Err(err) if err.is_invalid_table() => {
            info!(error = %err, "clone history table unavailable; falling back to clone requests");
        }
        Err(err) => return Err(err),
    }
    let query = format!("target_instance.instance_name={target}^state=Completed^ORDERBYDESCcompleted");
    let rows = api.query_table(REQUEST_TABLE, &query, 1, REQUEST_FIELDS).await?;
    Ok(rows.into_iter().next())
}

fn clone_timestamp(record: &Value) -> Option<DateTime<Utc>> {
    TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| record.get(*field).and_then(raw_value))
        .find_map(|raw| parse_clone_timestamp(&raw))
}

/// Parse `YYYY-MM-DD HH:MM:SS[.fff]` (UTC) or RFC 3339.
pub fn parse_clone_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(raw, pattern).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Age-based classification: at most `stale_after_days` old is fresh.
pub fn classify(
    config: &CloneCheckConfig,
    last_clone: DateTime<Utc>,
    now: DateTime<Utc>,
) -> CloneFreshnessResult {
    let age_days = (now - last_clone).num_days();
    let fresh = age_days <= config.stale_after_days;
    CloneFreshnessResult {
        status: if fresh {
            CloneStatus::Ok
        } else {
            CloneStatus::Stale
        },
        target_environment: config.target_environment.clone(),
        source_environment: config.source_environment.clone(),
        last_clone: Some(last_clone),
        age_days: Some(age_days),
        is_fresh: Some(fresh),
        detail: None,
    }
}
