//! Default expansion policy: ask the LLM for a bounded list of child
//! sub-goals, each either a further decomposition or a concrete leaf action.

use crate::base::{ExpandedIdea, ExpansionPolicy};
use orchestrator_core::{DetailKey, Details, Error, IdeaDag, NodeId, Result};
use orchestrator_llm::{LlmProvider, LlmRequest};
use serde::Deserialize;
use std::sync::Arc;

const EXPANSION_SYSTEM_PROMPT: &str = "You decompose a research sub-goal into 1-4 concrete next steps. \
Each step is either a further sub-goal to think about, or a leaf action: \
search (query a web search engine), visit (fetch and read a URL), think (reason over \
what's known so far), or save (persist a finding to memory). \
Respond with a JSON array of objects: \
[{\"title\": \"...\", \"action\": \"search\"|\"visit\"|\"think\"|\"save\"|null, \"query\": \"...\"}] \
Only include the fields relevant to the chosen action. Respond with JSON only.";

#[derive(Deserialize)]
struct RawIdea {
    title: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

pub struct LlmExpansionPolicy {
    llm: Arc<dyn LlmProvider>,
    model: String,
    max_children: usize,
}

impl LlmExpansionPolicy {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>, max_children: usize) -> Self {
        Self { llm, model: model.into(), max_children }
    }
}

#[async_trait::async_trait]
impl ExpansionPolicy for LlmExpansionPolicy {
    async fn expand(&self, dag: &IdeaDag, node_id: &NodeId) -> Result<Vec<ExpandedIdea>> {
        let node = dag.get(node_id).ok_or_else(|| Error::node_not_found(node_id.to_string()))?;
        let path = dag.path_to_root(node_id);
        let breadcrumb = path
            .iter()
            .filter_map(|id| dag.get(id).map(|n| n.title.clone()))
            .collect::<Vec<_>>()
            .join(" -> ");

        let prompt = format!(
            "Path so far: {}\nCurrent sub-goal: {}\nProduce up to {} next steps.",
            breadcrumb, node.title, self.max_children
        );
        let mut request = LlmRequest::single_user_turn(EXPANSION_SYSTEM_PROMPT, prompt);
        request.model = self.model.clone();

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| Error::internal(e.to_string()))?;

        let raw: Vec<RawIdea> = serde_json::from_str(response.text.trim())
            .map_err(|e| Error::InvalidDetail(format!("expansion response not valid JSON: {e}")))?;

        let mut out = Vec::with_capacity(raw.len().min(self.max_children));
        for idea in raw.into_iter().take(self.max_children) {
            let mut details: Details = Details::new();
            if let Some(action) = idea.action {
                details.insert(DetailKey::Action, serde_json::json!(action));
            }
            for (k, v) in idea.extra {
                if let Ok(key) = serde_json::from_value::<DetailKey>(serde_json::json!(k)) {
                    details.insert(key, v);
                }
            }
            out.push((idea.title, details, None));
        }
        Ok(out)
    }
}
