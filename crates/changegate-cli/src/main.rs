//! Changegate - pre-flight validation for infrastructure change requests
//!
//! The `changegate` command runs the validation pipeline against a live
//! change-management instance.
//!
//! ## Commands
//!
//! - `validate`: Validate a change from its webhook payload and print the verdict
//! - `collect`: Collect facts for a single component
//! - `clone-check`: Check how recently the target environment was cloned

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn, Level};

use change_api::{ChangeManagementApi, ServiceNowClient, ServiceNowCredentials};
use change_state::fakes::MemoryChangeStore;
use change_state::{ChangeValidationRecord, ComponentType};
use changegate_core::normalize::raw_value;
use changegate_core::{
    check_clone_freshness, collect_component, CloneCheckConfig, CollectContext, ComponentRef,
    PipelineConfig, ValidationPipeline, METRICS,
};
use reasoning_client::{HttpReasoningClient, ReasoningError};

#[derive(Parser)]
#[command(name = "changegate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pre-flight validation for infrastructure change requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a change request from its webhook payload
    Validate {
        /// Path to the webhook payload (JSON)
        #[arg(short, long)]
        payload: PathBuf,

        /// Change request sys_id (default: payload `sys_id`)
        #[arg(long)]
        change_id: Option<String>,

        /// Change number (default: payload `number`)
        #[arg(long)]
        change_number: Option<String>,

        /// Primary component type (default: payload `component_type`)
        #[arg(long)]
        component_type: Option<String>,

        /// Primary component sys_id (default: payload `component_id`)
        #[arg(long)]
        component_id: Option<String>,

        /// Instance environment to query
        #[arg(short, long, env = "CHANGEGATE_ENVIRONMENT", default_value = "UAT")]
        environment: String,

        /// Do not append a work note to the change
        #[arg(long)]
        no_publish: bool,
    },

    /// Collect live facts for a single component
    Collect {
        /// Component type (e.g. workflow, sc_cat_item, mid_server)
        #[arg(short = 't', long)]
        component_type: String,

        /// Component sys_id
        #[arg(long)]
        id: String,

        /// Instance environment to query
        #[arg(short, long, env = "CHANGEGATE_ENVIRONMENT", default_value = "UAT")]
        environment: String,
    },

    /// Check the clone freshness of the target environment
    CloneCheck {
        /// Environment the target is cloned from; its instance stores the
        /// clone history that is queried
        #[arg(long, default_value = "PROD")]
        source_environment: String,

        /// Environment whose last clone is checked
        #[arg(long, default_value = "UAT")]
        target_environment: String,

        /// Maximum clone age in days that still counts as fresh
        #[arg(long, default_value_t = 30)]
        stale_after_days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    changegate_core::init_tracing(cli.json, level);

    let outcome = match cli.command {
        Commands::Validate {
            payload,
            change_id,
            change_number,
            component_type,
            component_id,
            environment,
            no_publish,
        } => {
            let overrides = RecordOverrides {
                change_id,
                change_number,
                component_type,
                component_id,
            };
            cmd_validate(&payload, overrides, &environment, no_publish).await
        }
        Commands::Collect {
            component_type,
            id,
            environment,
        } => cmd_collect(&component_type, &id, &environment).await,
        Commands::CloneCheck {
            source_environment,
            target_environment,
            stale_after_days,
        } => cmd_clone_check(&source_environment, &target_environment, stale_after_days).await,
    };
    METRICS.flush();
    outcome
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Command-line values that take precedence over the payload.
#[derive(Debug, Default)]
struct RecordOverrides {
    change_id: Option<String>,
    change_number: Option<String>,
    component_type: Option<String>,
    component_id: Option<String>,
}

fn load_payload(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    let payload: Value = serde_json::from_str(&text)
        .with_context(|| format!("Payload {} is not valid JSON", path.display()))?;
    if !payload.is_object() {
        bail!("Payload {} must be a JSON object", path.display());
    }
    Ok(payload)
}

fn payload_field(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| payload.get(*key).and_then(raw_value))
}

/// Build a received record from the payload, with overrides applied.
fn record_from_payload(payload: Value, overrides: RecordOverrides) -> Result<ChangeValidationRecord> {
    let change_id = overrides
        .change_id
        .or_else(|| payload_field(&payload, &["sys_id", "change_id", "change_sys_id"]))
        .context("No change id: pass --change-id or include sys_id in the payload")?;
    let change_number = overrides
        .change_number
        .or_else(|| payload_field(&payload, &["number", "change_number"]))
        .unwrap_or_else(|| change_id.clone());
    let component_type = overrides
        .component_type
        .or_else(|| payload_field(&payload, &["component_type"]));
    let component_id = overrides
        .component_id
        .or_else(|| payload_field(&payload, &["component_id", "component_sys_id"]));

    let mut record = ChangeValidationRecord::new(change_id, change_number, payload);
    match (component_type, component_id) {
        (Some(component_type), Some(component_id)) => {
            let component_type: ComponentType = component_type
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid component type")?;
            record = record.with_component(component_type, component_id);
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("component type and id must both be known; validating without a primary component");
        }
        (None, None) => {}
    }
    Ok(record)
}

/// Point the clone check at the target environment's instance name when
/// it was not configured explicitly.
fn resolve_target_instance(clone_check: CloneCheckConfig) -> CloneCheckConfig {
    if clone_check.target_instance.is_some() {
        return clone_check;
    }
    match ServiceNowCredentials::from_environment(&clone_check.target_environment) {
        Ok(credentials) => {
            let instance = credentials.instance_name();
            clone_check.with_target_instance(&instance)
        }
        Err(_) => clone_check,
    }
}

async fn cmd_validate(
    payload_path: &Path,
    overrides: RecordOverrides,
    environment: &str,
    no_publish: bool,
) -> Result<()> {
    let payload = load_payload(payload_path)?;
    let record = record_from_payload(payload, overrides)?;
    let record_id = record.id.clone();
    info!(change_number = %record.change_number, environment = %environment, "validating change");

    let mut config = PipelineConfig::from_env();
    if no_publish {
        config = config.with_publish_results(false);
    }
    let clone_check = resolve_target_instance(config.clone_check.clone());
    config = config.with_clone_check(clone_check);

    let client = Arc::new(
        ServiceNowClient::from_environment(environment)
            .with_context(|| format!("Failed to configure change-management client for {environment}"))?,
    );
    info!(instance = %client.credentials().instance_name(), "change-management instance");
    let source_environment = config.clone_check.source_environment.clone();
    let clone_source: Arc<dyn ChangeManagementApi> =
        if source_environment.eq_ignore_ascii_case(environment) {
            client.clone()
        } else {
            Arc::new(clone_history_client(&source_environment)?)
        };
    let store = Arc::new(MemoryChangeStore::new());
    store
        .insert(record)
        .context("Failed to stage validation record")?;

    let mut pipeline = ValidationPipeline::new(store, client.clone(), config)
        .with_clone_source(clone_source)
        .with_publisher(client);
    match HttpReasoningClient::from_env() {
        Ok(service) => pipeline = pipeline.with_reasoning(Arc::new(service)),
        Err(ReasoningError::NotConfigured) => {
            info!("reasoning service not configured; using rule-based verdicts")
        }
        Err(err) => return Err(err).context("Failed to configure reasoning service client"),
    }

    let result = pipeline
        .process_validation(&record_id)
        .await
        .context("Validation failed")?;
    print_json(&result)
}

// ---------------------------------------------------------------------------
// collect
// ---------------------------------------------------------------------------

async fn cmd_collect(component_type: &str, id: &str, environment: &str) -> Result<()> {
    let component_type: ComponentType = component_type
        .parse()
        .map_err(anyhow::Error::msg)
        .context("Invalid component type")?;
    let config = PipelineConfig::from_env();
    let client = ServiceNowClient::from_environment(environment)
        .with_context(|| format!("Failed to configure change-management client for {environment}"))?;

    let ctx = CollectContext::new(&client, config.collectors.lookup_timeout);
    let reference = ComponentRef {
        component_type,
        id: id.to_string(),
        label: None,
        primary: true,
    };
    let block = collect_component(&ctx, &reference, &Value::Null).await;
    print_json(&block)
}

// ---------------------------------------------------------------------------
// clone-check
// ---------------------------------------------------------------------------

async fn cmd_clone_check(
    source_environment: &str,
    target_environment: &str,
    stale_after_days: i64,
) -> Result<()> {
    let config = PipelineConfig::from_env();
    let clone_check = resolve_target_instance(CloneCheckConfig {
        source_environment: source_environment.to_string(),
        target_environment: target_environment.to_string(),
        stale_after_days,
        ..config.clone_check
    });
    let client = clone_history_client(source_environment)?;

    let result =
        check_clone_freshness(&client, &clone_check, config.clone_check_timeout, Utc::now()).await;
    print_json(&result)
}

/// Client for the instance that records clones (the clone source).
fn clone_history_client(source_environment: &str) -> Result<ServiceNowClient> {
    ServiceNowClient::from_environment(source_environment).with_context(|| {
        format!("Failed to configure clone-history client for {source_environment}")
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}
