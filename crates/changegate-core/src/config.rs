//! Pipeline configuration.
//!
//! All settings have working defaults. [`PipelineConfig::from_env`] overlays
//! `CHANGEGATE_*` variables; values that fail to parse are logged and the
//! default is kept.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use change_state::ComponentType;

/// Bounds for live component lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Timeout applied to each individual sub-lookup
    pub lookup_timeout: Duration,
    /// Maximum number of components collected concurrently
    pub max_concurrent: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(15),
            max_concurrent: 4,
        }
    }
}

/// Bounds for the reasoning-service exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisConfig {
    pub max_turns: usize,
    /// Timeout for each individual service call
    pub call_timeout: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_turns: 6,
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Which changes get an environment clone-freshness check, and against what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneCheckConfig {
    /// Case-insensitive phrase the change label must contain
    pub phrase: String,
    /// Primary component types the check applies to
    pub component_types: Vec<ComponentType>,
    pub target_environment: String,
    /// Environment whose instance keeps the clone history
    pub source_environment: String,
    /// Instance name recorded in clone history; defaults to the lowercased
    /// target environment
    pub target_instance: Option<String>,
    pub stale_after_days: i64,
}

impl Default for CloneCheckConfig {
    fn default() -> Self {
        Self {
            phrase: "clone".to_string(),
            component_types: vec![ComponentType::ConfigurationItem, ComponentType::Template],
            target_environment: "UAT".to_string(),
            source_environment: "PROD".to_string(),
            target_instance: None,
            stale_after_days: 30,
        }
    }
}

impl CloneCheckConfig {
    pub fn target_instance(&self) -> String {
        self.target_instance
            .clone()
            .unwrap_or_else(|| self.target_environment.to_ascii_lowercase())
    }

    pub fn with_target_instance(mut self, instance: &str) -> Self {
        self.target_instance = Some(instance.to_string());
        self
    }
}

/// Top-level configuration for [`crate::ValidationPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub collectors: CollectorConfig,
    pub change_details_timeout: Duration,
    pub clone_check_timeout: Duration,
    pub synthesis: SynthesisConfig,
    pub clone_check: CloneCheckConfig,
    /// Publish a work note once the verdict is stored
    pub publish_results: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collectors: CollectorConfig::default(),
            change_details_timeout: Duration::from_secs(15),
            clone_check_timeout: Duration::from_secs(20),
            synthesis: SynthesisConfig::default(),
            clone_check: CloneCheckConfig::default(),
            publish_results: true,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with `CHANGEGATE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let env = EnvOverlay { lookup: &lookup };

        env.millis("CHANGEGATE_LOOKUP_TIMEOUT_MS", &mut config.collectors.lookup_timeout);
        env.parsed(
            "CHANGEGATE_MAX_CONCURRENT_LOOKUPS",
            &mut config.collectors.max_concurrent,
        );
        env.millis(
            "CHANGEGATE_CHANGE_DETAILS_TIMEOUT_MS",
            &mut config.change_details_timeout,
        );
        env.millis("CHANGEGATE_CLONE_CHECK_TIMEOUT_MS", &mut config.clone_check_timeout);
        env.parsed("CHANGEGATE_REASONING_MAX_TURNS", &mut config.synthesis.max_turns);
        env.millis(
            "CHANGEGATE_REASONING_TIMEOUT_MS",
            &mut config.synthesis.call_timeout,
        );
        env.parsed("CHANGEGATE_PUBLISH", &mut config.publish_results);

        let clone = &mut config.clone_check;
        env.text("CHANGEGATE_CLONE_PHRASE", &mut clone.phrase);
        env.text("CHANGEGATE_CLONE_TARGET_ENV", &mut clone.target_environment);
        env.text("CHANGEGATE_CLONE_SOURCE_ENV", &mut clone.source_environment);
        env.parsed("CHANGEGATE_CLONE_STALE_DAYS", &mut clone.stale_after_days);
        if let Some(instance) = env.value("CHANGEGATE_CLONE_TARGET_INSTANCE") {
            clone.target_instance = Some(instance);
        }
        if let Some(raw) = env.value("CHANGEGATE_CLONE_COMPONENT_TYPES") {
            match parse_component_types(&raw) {
                Ok(types) => clone.component_types = types,
                Err(err) => warn!(
                    key = "CHANGEGATE_CLONE_COMPONENT_TYPES",
                    error = %err,
                    "ignoring unparseable setting"
                ),
            }
        }

        config.collectors.max_concurrent = config.collectors.max_concurrent.max(1);
        config.synthesis.max_turns = config.synthesis.max_turns.max(1);
        config
    }

    pub fn with_publish_results(mut self, publish: bool) -> Self {
        self.publish_results = publish;
        self
    }

    pub fn with_clone_check(mut self, clone_check: CloneCheckConfig) -> Self {
        self.clone_check = clone_check;
        self
    }
}

fn parse_component_types(raw: &str) -> Result<Vec<ComponentType>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ComponentType::from_str)
        .collect()
}

struct EnvOverlay<'a, F> {
    lookup: &'a F,
}

impl<F> EnvOverlay<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn value(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn text(&self, key: &str, target: &mut String) {
        if let Some(value) = self.value(key) {
            *target = value;
        }
    }

    fn parsed<T: FromStr>(&self, key: &str, target: &mut T) {
        if let Some(raw) = self.value(key) {
            match raw.parse() {
                Ok(value) => *target = value,
                Err(_) => warn!(key = %key, value = %raw, "ignoring unparseable setting"),
            }
        }
    }

    fn millis(&self, key: &str, target: &mut Duration) {
        let mut ms = target.as_millis() as u64;
        self.parsed(key, &mut ms);
        *target = Duration::from_millis(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::from_lookup(|_| None);
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.synthesis.max_turns, 6);
        assert_eq!(config.clone_check.stale_after_days, 30);
        assert_eq!(config.clone_check.target_instance(), "uat");
    }

    #[test]
    fn overrides_apply_and_bad_values_keep_defaults() {
        let lookup = |key: &str| match key {
            "CHANGEGATE_LOOKUP_TIMEOUT_MS" => Some("2500".to_string()),
            "CHANGEGATE_REASONING_MAX_TURNS" => Some("three".to_string()),
            "CHANGEGATE_CLONE_COMPONENT_TYPES" => Some("sys_template, catalog item".to_string()),
            "CHANGEGATE_PUBLISH" => Some("false".to_string()),
            _ => None,
        };
        let config = PipelineConfig::from_lookup(lookup);
        assert_eq!(config.collectors.lookup_timeout, Duration::from_millis(2500));
        assert_eq!(config.synthesis.max_turns, 6);
        assert_eq!(
            config.clone_check.component_types,
            vec![ComponentType::Template, ComponentType::CatalogItem]
        );
        assert!(!config.publish_results);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let lookup =
            |key: &str| (key == "CHANGEGATE_MAX_CONCURRENT_LOOKUPS").then(|| "0".to_string());
        assert_eq!(PipelineConfig::from_lookup(lookup).collectors.max_concurrent, 1);
    }
}
