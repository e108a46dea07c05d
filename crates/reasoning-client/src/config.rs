//! Reasoning service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4_096;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Endpoint, credentials and generation limits for the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningConfig {
    /// Messages endpoint URL
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub api_version: String,
    pub max_tokens: u32,
    /// Transport-level ceiling; the pipeline applies its own per-call timeout
    pub http_timeout_secs: u64,
}

impl ReasoningConfig {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        ReasoningConfig {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    /// Read `REASONING_*` environment variables.
    ///
    /// Returns `None` when the endpoint or key is missing, which the
    /// pipeline treats as "reasoning service unconfigured".
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("REASONING_API_URL").filter(|v| !v.is_empty())?;
        let api_key = lookup("REASONING_API_KEY").filter(|v| !v.is_empty())?;
        let mut config = Self::new(&api_url, &api_key);
        if let Some(model) = lookup("REASONING_MODEL").filter(|v| !v.is_empty()) {
            config.model = model;
        }
        if let Some(version) = lookup("REASONING_API_VERSION").filter(|v| !v.is_empty()) {
            config.api_version = version;
        }
        if let Some(max_tokens) = lookup("REASONING_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            config.max_tokens = max_tokens;
        }
        Some(config)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_without_url_or_key() {
        assert!(ReasoningConfig::from_lookup(|_| None).is_none());
        let only_url = |key: &str| {
            (key == "REASONING_API_URL").then(|| "https://reasoning.example.com/v1/messages".into())
        };
        assert!(ReasoningConfig::from_lookup(only_url).is_none());
    }

    #[test]
    fn test_from_lookup_applies_overrides() {
        let lookup = |key: &str| match key {
            "REASONING_API_URL" => Some("https://reasoning.example.com/v1/messages".to_string()),
            "REASONING_API_KEY" => Some("sk-test".to_string()),
            "REASONING_MAX_TOKENS" => Some("2048".to_string()),
            "REASONING_MODEL" => Some("validator-large".to_string()),
            _ => None,
        };
        let config = ReasoningConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.model, "validator-large");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
    }
}
