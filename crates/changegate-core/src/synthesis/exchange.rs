//! Bounded multi-turn exchange with the reasoning service.
//!
//! The loop keeps a turn counter and the growing transcript. It exits when
//! the service returns a final turn, or fails once `max_turns` calls have
//! been made without one. Each call has its own timeout.

use reasoning_client::{Message, ReasoningRequest, ReasoningService, TurnOutcome};
use tracing::debug;

use crate::config::SynthesisConfig;
use crate::domain::SynthesisError;
use crate::timeout::with_timeout;

/// Text of the final turn and how many calls it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub text: String,
    pub turns: usize,
}

pub async fn run_exchange(
    service: &dyn ReasoningService,
    system: &str,
    prompt: &str,
    config: &SynthesisConfig,
) -> Result<ExchangeOutcome, SynthesisError> {
    let max_turns = config.max_turns.max(1);
    let mut request = ReasoningRequest::new(system, prompt);

    for turn in 1..=max_turns {
        let reply = with_timeout(service.complete(&request), config.call_timeout, "reasoning turn")
            .await
            .ok_or(SynthesisError::TimedOut {
                turn,
                timeout_ms: config.call_timeout.as_millis() as u64,
            })??;

        match reply.outcome {
            TurnOutcome::Final => {
                debug!(turn, "reasoning service returned a final turn");
                return Ok(ExchangeOutcome {
                    text: reply.text,
                    turns: turn,
                });
            }
            TurnOutcome::NeedsContinuation => {
                debug!(turn, "reasoning service paused; continuing");
                request.messages.push(Message::from_turn(reply));
            }
        }
    }
    Err(SynthesisError::TurnLimitExceeded { max_turns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reasoning_client::fakes::ScriptedReasoner;
    use reasoning_client::{MessageContent, ReasoningError, ReasoningTurn, Role};
    use serde_json::json;
    use std::time::Duration;

    fn config(max_turns: usize) -> SynthesisConfig {
        SynthesisConfig {
            max_turns,
            call_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn paused_turns_are_fed_back() {
        let service = ScriptedReasoner::new(vec![
            Ok(ReasoningTurn::paused("step one")),
            Ok(ReasoningTurn::paused("step two")),
            Ok(ReasoningTurn::final_answer("{\"overall_status\": \"APPROVE\"}")),
        ]);
        let outcome = run_exchange(&service, "sys", "facts", &config(6)).await.unwrap();
        assert_eq!(outcome.turns, 3);

        let requests = service.requests();
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[2].messages.len(), 3);
        assert_eq!(requests[2].messages[1].role, Role::Assistant);
        assert_eq!(requests[2].messages[2].content.as_text(), Some("step two"));
    }

    #[tokio::test]
    async fn paused_tool_blocks_are_fed_back_unchanged() {
        let blocks = vec![
            json!({"type": "text", "text": "Looking up the CVE."}),
            json!({"type": "server_tool_use", "id": "srvtoolu_7", "name": "web_search", "input": {"query": "CVE-2024-1234"}}),
        ];
        let service = ScriptedReasoner::new(vec![
            Ok(ReasoningTurn::paused("Looking up the CVE.").with_blocks(blocks.clone())),
            Ok(ReasoningTurn::final_answer("{\"overall_status\": \"APPROVE\"}")),
        ]);
        run_exchange(&service, "sys", "facts", &config(6)).await.unwrap();

        let echoed = &service.requests()[1].messages[1];
        assert_eq!(echoed.role, Role::Assistant);
        assert_eq!(echoed.content, MessageContent::Blocks(blocks));
    }

    #[tokio::test]
    async fn turn_limit_is_a_hard_failure() {
        let service = ScriptedReasoner::repeating(ReasoningTurn::paused("thinking"));
        let err = run_exchange(&service, "sys", "facts", &config(3)).await.unwrap_err();
        assert!(matches!(err, SynthesisError::TurnLimitExceeded { max_turns: 3 }));
        assert_eq!(service.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let service = ScriptedReasoner::answering("{}").with_delay(Duration::from_secs(30));
        let err = run_exchange(&service, "sys", "facts", &config(6)).await.unwrap_err();
        assert!(matches!(err, SynthesisError::TimedOut { turn: 1, .. }));
    }

    #[tokio::test]
    async fn service_errors_propagate() {
        let service = ScriptedReasoner::new(vec![Err(ReasoningError::Status {
            status: 529,
            detail: "overloaded".into(),
        })]);
        let err = run_exchange(&service, "sys", "facts", &config(6)).await.unwrap_err();
        assert!(matches!(err, SynthesisError::Service(_)));
    }
}
