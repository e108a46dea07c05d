//! Verdict synthesis.
//!
//! Strategies are tried in order until one yields a verdict: the reasoning
//! service when configured, then the deterministic rule-based verdict. A
//! reasoning failure of any kind (transport, timeout, turn limit,
//! unparseable output) is logged and absorbed here; it never fails the run.

pub mod exchange;
pub mod fallback;
pub mod normalize;
pub mod parse;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use change_state::ValidationResult;
use reasoning_client::ReasoningService;

use crate::config::SynthesisConfig;
use crate::domain::{FactBundle, SynthesisError};
use crate::metrics::METRICS;
use crate::obs;

pub use exchange::{run_exchange, ExchangeOutcome};
pub use fallback::rule_based_verdict;
pub use normalize::normalize_verdict;
pub use parse::{parse_verdict, ParseOutcome};

/// One way of turning a fact bundle into a verdict.
#[async_trait]
pub trait SynthesisStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` hands over to the next strategy.
    async fn attempt(&self, bundle: &FactBundle) -> Option<ValidationResult>;
}

/// Verdict from the remote reasoning service.
pub struct ReasoningStrategy {
    service: Arc<dyn ReasoningService>,
    config: SynthesisConfig,
}

impl ReasoningStrategy {
    pub fn new(service: Arc<dyn ReasoningService>, config: SynthesisConfig) -> Self {
        Self { service, config }
    }

    /// Full exchange plus parsing, with every failure typed.
    pub async fn synthesize(&self, bundle: &FactBundle) -> Result<ValidationResult, SynthesisError> {
        let user_prompt =
            prompt::build_prompt(bundle).map_err(|e| SynthesisError::Prompt(e.to_string()))?;
        let outcome = run_exchange(
            self.service.as_ref(),
            prompt::SYSTEM_FRAMING,
            &user_prompt,
            &self.config,
        )
        .await?;
        match parse_verdict(&outcome.text) {
            ParseOutcome::Verdict(verdict) => {
                info!(turns = outcome.turns, status = %verdict.overall_status, "reasoning verdict parsed");
                Ok(verdict)
            }
            ParseOutcome::NoVerdict { candidates } => Err(SynthesisError::Unparseable { candidates }),
        }
    }
}

#[async_trait]
impl SynthesisStrategy for ReasoningStrategy {
    fn name(&self) -> &'static str {
        "reasoning_service"
    }

    async fn attempt(&self, bundle: &FactBundle) -> Option<ValidationResult> {
        match self.synthesize(bundle).await {
            Ok(verdict) => Some(verdict),
            Err(err) => {
                obs::emit_synthesis_fallback(self.name(), &err);
                METRICS.inc_reasoning_fallbacks();
                None
            }
        }
    }
}

/// Deterministic verdict from the checks map. Always answers.
pub struct RuleBasedStrategy;

#[async_trait]
impl SynthesisStrategy for RuleBasedStrategy {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn attempt(&self, bundle: &FactBundle) -> Option<ValidationResult> {
        Some(rule_based_verdict(&bundle.checks()))
    }
}

/// Ordered strategy chain ending in the rule-based verdict.
pub struct VerdictSynthesizer {
    strategies: Vec<Box<dyn SynthesisStrategy>>,
}

impl VerdictSynthesizer {
    /// Without a service the chain is rule-based only.
    pub fn new(service: Option<Arc<dyn ReasoningService>>, config: SynthesisConfig) -> Self {
        let mut strategies: Vec<Box<dyn SynthesisStrategy>> = Vec::with_capacity(2);
        match service {
            Some(service) => strategies.push(Box::new(ReasoningStrategy::new(service, config))),
            None => obs::emit_synthesis_fallback("reasoning_service", &"not configured"),
        }
        strategies.push(Box::new(RuleBasedStrategy));
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Raw verdict from the first strategy that answers. Not yet normalized.
    #[instrument(skip_all, fields(change_number = %bundle.change_number))]
    pub async fn synthesize(&self, bundle: &FactBundle) -> ValidationResult {
        for strategy in &self.strategies {
            if let Some(verdict) = strategy.attempt(bundle).await {
                info!(strategy = strategy.name(), status = %verdict.overall_status, "verdict synthesized");
                return verdict;
            }
        }
        rule_based_verdict(&bundle.checks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CloneFreshnessResult, DocumentationBundle};
    use change_state::{OverallStatus, VerdictSource};
    use reasoning_client::fakes::ScriptedReasoner;
    use reasoning_client::ReasoningTurn;
    use std::collections::BTreeMap;

    fn bundle() -> FactBundle {
        FactBundle {
            change_id: "c1".into(),
            change_number: "CHG0000001".into(),
            primary_component: None,
            label: "Update docs".into(),
            change_facts: BTreeMap::new(),
            components: Vec::new(),
            clone_freshness: CloneFreshnessResult::skipped("UAT", "PROD"),
            documentation: DocumentationBundle {
                implementation_plan: "deploy".into(),
                rollback_plan: "revert".into(),
                test_plan: "smoke".into(),
                justification: "audit".into(),
            },
            collection_errors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn unconfigured_service_is_rule_based() {
        let synthesizer = VerdictSynthesizer::new(None, SynthesisConfig::default());
        assert_eq!(synthesizer.strategy_names(), vec!["rule_based"]);
        let verdict = synthesizer.synthesize(&bundle()).await;
        assert_eq!(verdict.synthesized_by, VerdictSource::RuleBased);
        assert_eq!(verdict.overall_status, OverallStatus::Approve);
    }

    #[tokio::test]
    async fn parsed_reply_wins() {
        let service = Arc::new(ScriptedReasoner::answering(
            "```json\n{\"overall_status\": \"REJECT\", \"required_actions\": [\"add CAB approval\"]}\n```",
        ));
        let synthesizer = VerdictSynthesizer::new(Some(service), SynthesisConfig::default());
        let verdict = synthesizer.synthesize(&bundle()).await;
        assert_eq!(verdict.synthesized_by, VerdictSource::ReasoningService);
        assert_eq!(verdict.overall_status, OverallStatus::Reject);
        assert_eq!(verdict.required_actions, vec!["add CAB approval"]);
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back() {
        let service = Arc::new(ScriptedReasoner::answering("I think it looks fine."));
        let strategy = ReasoningStrategy::new(service.clone(), SynthesisConfig::default());
        let err = strategy.synthesize(&bundle()).await.unwrap_err();
        assert!(matches!(err, SynthesisError::Unparseable { candidates: 1 }));

        let synthesizer = VerdictSynthesizer::new(
            Some(Arc::new(ScriptedReasoner::repeating(ReasoningTurn::final_answer("no json")))),
            SynthesisConfig::default(),
        );
        let verdict = synthesizer.synthesize(&bundle()).await;
        assert_eq!(verdict.synthesized_by, VerdictSource::RuleBased);
    }
}
