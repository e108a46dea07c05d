//! Scripted reasoning service (testing only)
//!
//! `ScriptedReasoner` replays a queue of turns or errors, optionally sleeps
//! before answering, and records every request it receives so tests can
//! inspect how the conversation grew between turns.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ReasoningError;
use crate::{ReasoningRequest, ReasoningService, ReasoningTurn, Result};

#[derive(Debug, Default)]
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<Result<ReasoningTurn>>>,
    repeat: Option<ReasoningTurn>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedReasoner {
    /// Replay `script` in order; once exhausted every call fails.
    pub fn new(script: Vec<Result<ReasoningTurn>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Single final answer.
    pub fn answering(text: &str) -> Self {
        Self::new(vec![Ok(ReasoningTurn::final_answer(text))])
    }

    /// Answer every call with the same turn, forever.
    pub fn repeating(turn: ReasoningTurn) -> Self {
        Self {
            repeat: Some(turn),
            ..Self::default()
        }
    }

    /// Sleep before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn complete(&self, request: &ReasoningRequest) -> Result<ReasoningTurn> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        match (next, &self.repeat) {
            (Some(step), _) => step,
            (None, Some(turn)) => Ok(turn.clone()),
            (None, None) => Err(ReasoningError::Transport("script exhausted".to_string())),
        }
    }
}
