//! HTTP transport for a messages-style reasoning endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ReasoningConfig;
use crate::error::ReasoningError;
use crate::{Message, ReasoningRequest, ReasoningService, ReasoningTurn, Result, TurnOutcome};

/// Stop reason the endpoint uses when it paused a long-running turn.
const PAUSE_STOP_REASON: &str = "pause_turn";

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Reasoning service client over HTTP.
pub struct HttpReasoningClient {
    config: ReasoningConfig,
    http_client: reqwest::Client,
}

impl HttpReasoningClient {
    pub fn new(config: ReasoningConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("changegate-reasoning/", env!("CARGO_PKG_VERSION")))
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| ReasoningError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpReasoningClient {
            config,
            http_client,
        })
    }

    /// Build a client from `REASONING_*` variables.
    pub fn from_env() -> Result<Self> {
        let config = ReasoningConfig::from_env().ok_or(ReasoningError::NotConfigured)?;
        Self::new(config)
    }
}

/// Turn a decoded response body into a [`ReasoningTurn`].
fn turn_from_wire(response: WireResponse) -> ReasoningTurn {
    let text = response
        .content
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");
    let outcome = match response.stop_reason.as_deref() {
        Some(PAUSE_STOP_REASON) => TurnOutcome::NeedsContinuation,
        _ => TurnOutcome::Final,
    };
    ReasoningTurn {
        text,
        blocks: response.content,
        outcome,
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningClient {
    async fn complete(&self, request: &ReasoningRequest) -> Result<ReasoningTurn> {
        let body = WireRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: &request.system,
            messages: &request.messages,
        };
        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            "reasoning request"
        );

        let response = self
            .http_client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let wire: WireResponse = response.json().await?;
        Ok(turn_from_wire(wire))
    }
}
