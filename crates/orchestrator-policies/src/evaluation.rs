//! Default evaluation policy: ask the LLM to score a node's promise toward
//! its root mandate on a 0.0-1.0 scale.

use crate::base::EvaluationPolicy;
use orchestrator_core::{IdeaDag, NodeId, Result};
use orchestrator_llm::{LlmProvider, LlmRequest};
use std::sync::Arc;

const EVAL_SYSTEM_PROMPT: &str = "You evaluate how promising a research sub-goal is toward completing \
a larger mandate. Respond with only a number between 0.0 and 1.0, nothing else.";

pub struct LlmEvaluationPolicy {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmEvaluationPolicy {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self { llm, model: model.into() }
    }
}

#[async_trait::async_trait]
impl EvaluationPolicy for LlmEvaluationPolicy {
    async fn evaluate(&self, dag: &IdeaDag, node_id: &NodeId) -> Result<f64> {
        let node = dag.get(node_id).ok_or_else(|| orchestrator_core::Error::node_not_found(node_id.to_string()))?;
        let root_title = &dag.get(dag.root_id()).map(|n| n.title.clone()).unwrap_or_default();
        let prompt = format!("Mandate: {}\nSub-goal: {}\nScore (0.0-1.0):", root_title, node.title);

        let mut request = LlmRequest::single_user_turn(EVAL_SYSTEM_PROMPT, prompt);
        request.model = self.model.clone();
        let response = self.llm.complete(request).await.map_err(|e| orchestrator_core::Error::internal(e.to_string()))?;
        let score: f64 = response.text.trim().parse().unwrap_or(0.5);
        Ok(score.clamp(0.0, 1.0))
    }
}
