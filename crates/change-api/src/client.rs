//! Table REST API client
//!
//! Talks to `/api/now/table/*` with basic auth. Every request goes through
//! [`retry_with_backoff`], so transient failures are retried here and
//! callers only see what is left after the attempt budget is spent.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::api::{ChangeManagementApi, ResultPublisher};
use crate::config::ServiceNowCredentials;
use crate::error::ApiError;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::Result;

const CHANGE_TABLE: &str = "change_request";
const RELATIONSHIP_TABLE: &str = "cmdb_rel_ci";
const RELATIONSHIP_LIMIT: usize = 100;

/// Client for one change-management instance.
pub struct ServiceNowClient {
    credentials: ServiceNowCredentials,
    retry: RetryPolicy,
    http_client: reqwest::Client,
}

impl ServiceNowClient {
    /// Create a client from explicit credentials.
    pub fn new(credentials: ServiceNowCredentials) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("changegate/", env!("CARGO_PKG_VERSION")))
            .timeout(credentials.timeout())
            .danger_accept_invalid_certs(!credentials.verify_ssl)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(ServiceNowClient {
            credentials,
            retry: RetryPolicy::default(),
            http_client,
        })
    }

    /// Create a client from `SERVICENOW_*` environment variables.
    pub fn from_environment(environment: &str) -> Result<Self> {
        Self::new(ServiceNowCredentials::from_environment(environment)?)
    }

    pub fn credentials(&self) -> &ServiceNowCredentials {
        &self.credentials
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.credentials.url, path);
        retry_with_backoff(&self.retry, path, || {
            let method = method.clone();
            let url = url.clone();
            async move {
                debug!(method = %method, url = %url, "change-management request");
                let mut request = self
                    .http_client
                    .request(method, &url)
                    .basic_auth(&self.credentials.username, Some(&self.credentials.password))
                    .header(reqwest::header::ACCEPT, "application/json")
                    .query(params);
                if let Some(body) = body {
                    request = request.json(body);
                }

                let response = request.send().await?;
                let status = response.status();
                if status.is_client_error() || status.is_server_error() {
                    let detail = response.text().await.unwrap_or_default();
                    return Err(ApiError::Status {
                        status: status.as_u16(),
                        detail,
                    });
                }
                Ok(response.json::<Value>().await?)
            }
        })
        .await
    }

    fn extract_result(payload: Value) -> Result<Value> {
        match payload {
            Value::Object(mut map) => map.remove("result").ok_or(ApiError::MissingResult),
            _ => Err(ApiError::MissingResult),
        }
    }

    fn field_params(fields: &[&str]) -> Vec<(&'static str, String)> {
        let mut params = vec![("sysparm_display_value", "all".to_string())];
        if !fields.is_empty() {
            params.push(("sysparm_fields", fields.join(",")));
        }
        params
    }
}

#[async_trait]
impl ChangeManagementApi for ServiceNowClient {
    async fn fetch_change_details(&self, change_id: &str) -> Result<Value> {
        self.fetch_record(CHANGE_TABLE, change_id, &[]).await
    }

    async fn fetch_record(&self, table: &str, id: &str, fields: &[&str]) -> Result<Value> {
        let path = format!("/api/now/table/{table}/{id}");
        let payload = self
            .request(Method::GET, &path, &Self::field_params(fields), None)
            .await
            .map_err(|err| match err {
                ApiError::Status { status: 404, .. } => ApiError::NotFound {
                    table: table.to_string(),
                    id: id.to_string(),
                },
                other => other,
            })?;
        Self::extract_result(payload)
    }

    async fn fetch_relationships(&self, ci_id: &str) -> Result<Vec<Value>> {
        let query = format!("parent={ci_id}^ORchild={ci_id}");
        self.query_table(
            RELATIONSHIP_TABLE,
            &query,
            RELATIONSHIP_LIMIT,
            &["sys_id", "parent", "child", "type"],
        )
        .await
    }

    async fn query_table(
        &self,
        table: &str,
        query: &str,
        limit: usize,
        fields: &[&str],
    ) -> Result<Vec<Value>> {
        let path = format!("/api/now/table/{table}");
        let mut params = Self::field_params(fields);
        params.push(("sysparm_query", query.to_string()));
        params.push(("sysparm_limit", limit.to_string()));

        let payload = self.request(Method::GET, &path, &params, None).await?;
        match Self::extract_result(payload)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(ApiError::Json(format!(
                "expected array result from {table}, got {other}"
            ))),
        }
    }
}

#[async_trait]
impl ResultPublisher for ServiceNowClient {
    async fn append_work_note(&self, change_id: &str, text: &str) -> Result<()> {
        let path = format!("/api/now/table/{CHANGE_TABLE}/{change_id}");
        let body = serde_json::json!({ "work_notes": text });
        let payload = self.request(Method::PATCH, &path, &[], Some(&body)).await?;
        Self::extract_result(payload).map(|_| ())
    }
}
