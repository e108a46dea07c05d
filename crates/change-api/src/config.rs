//! Connection settings for the change-management instance.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::Result;

/// Credentials and transport settings for one instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceNowCredentials {
    /// Base URL without trailing slash, e.g. `https://acme-uat.service-now.com`
    pub url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub verify_ssl: bool,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl ServiceNowCredentials {
    /// Create credentials with default transport settings.
    pub fn new(url: &str, username: &str, password: &str) -> Self {
        ServiceNowCredentials {
            url: url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            verify_ssl: true,
            timeout_secs: 30,
        }
    }

    /// Load credentials for an environment (e.g. `UAT`, `PROD`) from
    /// process environment variables.
    ///
    /// For each key the lookup order is `{ENV}_SERVICENOW_{KEY}`,
    /// `SERVICENOW_{ENV}_{KEY}`, then `SERVICENOW_{KEY}`.
    pub fn from_environment(environment: &str) -> Result<Self> {
        Self::from_lookup(environment, |key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_environment`] with an injectable variable source.
    pub fn from_lookup<F>(environment: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = environment.to_ascii_uppercase();
        let prefixes = [
            format!("{env}_SERVICENOW"),
            format!("SERVICENOW_{env}"),
            "SERVICENOW".to_string(),
        ];
        let find = |suffix: &str| {
            prefixes
                .iter()
                .filter_map(|prefix| lookup(&format!("{prefix}_{suffix}")))
                .find(|value| !value.is_empty())
        };

        let (url, username, password) = match (find("URL"), find("USERNAME"), find("PASSWORD")) {
            (Some(url), Some(username), Some(password)) => (url, username, password),
            _ => {
                return Err(ApiError::Config(format!(
                    "missing credentials for {environment}; set SERVICENOW_{env}_URL, \
                     SERVICENOW_{env}_USERNAME and SERVICENOW_{env}_PASSWORD"
                )))
            }
        };

        let verify_ssl = find("VERIFY_SSL")
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        let timeout_secs = match find("TIMEOUT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::Config(format!("invalid timeout value '{raw}'")))?,
            None => 30,
        };

        Ok(ServiceNowCredentials {
            verify_ssl,
            timeout_secs,
            ..Self::new(&url, &username, &password)
        })
    }

    /// Instance name: the first DNS label of the URL host. IP hosts are
    /// returned whole; an unparseable URL is returned as configured.
    pub fn instance_name(&self) -> String {
        let Ok(url) = Url::parse(&self.url) else {
            return self.url.clone();
        };
        match (url.domain(), url.host_str()) {
            (Some(domain), _) => domain.split('.').next().unwrap_or(domain).to_string(),
            (None, Some(host)) => host.to_string(),
            (None, None) => self.url.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
