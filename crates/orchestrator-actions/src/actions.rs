//! The four leaf actions: SEARCH, VISIT, THINK, SAVE.

use crate::io::ActionIo;
use crate::registry::{ActionOutcome, LeafAction};
use orchestrator_core::{ActionType, DetailKey, IdeaNode};
use orchestrator_llm::LlmRequest;

pub struct SearchAction;

#[async_trait::async_trait]
impl LeafAction for SearchAction {
    fn action_type(&self) -> ActionType {
        ActionType::Search
    }

    fn validate(&self, node: &IdeaNode) -> Result<(), String> {
        if node.details.get(&DetailKey::Query).and_then(|v| v.as_str()).is_none() {
            return Err("search requires a query".to_string());
        }
        Ok(())
    }

    async fn execute(&self, node: &IdeaNode, io: &ActionIo) -> ActionOutcome {
        let Some(query) = node.details.get(&DetailKey::Query).and_then(|v| v.as_str()) else {
            return ActionOutcome::permanent_failure("search requires a query");
        };
        let n_results = node
            .details
            .get(&DetailKey::NResults)
            .and_then(|v| v.as_u64())
            .unwrap_or(5) as usize;

        match io.search.search(query, n_results).await {
            Ok(hits) => ActionOutcome::ok(serde_json::json!({ "hits": hits })),
            Err(e) if e.is_retryable() => ActionOutcome::retryable_failure(e.to_string()),
            Err(e) => ActionOutcome::permanent_failure(e.to_string()),
        }
    }
}

pub struct VisitAction;

#[async_trait::async_trait]
impl LeafAction for VisitAction {
    fn action_type(&self) -> ActionType {
        ActionType::Visit
    }

    fn validate(&self, node: &IdeaNode) -> Result<(), String> {
        let has_url = node.details.get(&DetailKey::Url).and_then(|v| v.as_str()).is_some()
            || node.details.get(&DetailKey::Link).and_then(|v| v.as_str()).is_some();
        if !has_url {
            return Err("visit requires a url".to_string());
        }
        Ok(())
    }

    async fn execute(&self, node: &IdeaNode, io: &ActionIo) -> ActionOutcome {
        let url = node
            .details
            .get(&DetailKey::Url)
            .or_else(|| node.details.get(&DetailKey::Link))
            .and_then(|v| v.as_str());
        let Some(url) = url else {
            return ActionOutcome::permanent_failure("visit requires a url");
        };
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return ActionOutcome::permanent_failure(format!("unsupported url scheme: {url}"));
        }

        match io.fetch.fetch(url).await {
            Ok(page) => ActionOutcome::ok(serde_json::json!({
                "content": page.content,
                "url": page.url,
                "title": page.title,
            })),
            Err(e) if e.is_retryable() => ActionOutcome::retryable_failure(e.to_string()),
            Err(e) => ActionOutcome::permanent_failure(e.to_string()),
        }
    }
}

pub struct ThinkAction;

#[async_trait::async_trait]
impl LeafAction for ThinkAction {
    fn action_type(&self) -> ActionType {
        ActionType::Think
    }

    fn validate(&self, node: &IdeaNode) -> Result<(), String> {
        if node.details.get(&DetailKey::Text).and_then(|v| v.as_str()).is_none() {
            return Err("think requires text".to_string());
        }
        Ok(())
    }

    async fn execute(&self, node: &IdeaNode, io: &ActionIo) -> ActionOutcome {
        let Some(text) = node.details.get(&DetailKey::Text).and_then(|v| v.as_str()) else {
            return ActionOutcome::permanent_failure("think requires text");
        };
        let request = LlmRequest::single_user_turn(
            "Reason step by step about the prompt and give a concise, direct answer.",
            text,
        );
        match io.llm.complete(request).await {
            Ok(response) => ActionOutcome::ok(serde_json::json!({ "text": response.text })),
            Err(e) if e.is_retryable() => ActionOutcome::retryable_failure(e.to_string()),
            Err(e) => ActionOutcome::permanent_failure(e.to_string()),
        }
    }
}

pub struct SaveAction;

#[async_trait::async_trait]
impl LeafAction for SaveAction {
    fn action_type(&self) -> ActionType {
        ActionType::Save
    }

    fn validate(&self, node: &IdeaNode) -> Result<(), String> {
        if node.details.get(&DetailKey::Documents).and_then(|v| v.as_array()).is_none() {
            return Err("save requires documents".to_string());
        }
        Ok(())
    }

    async fn execute(&self, node: &IdeaNode, io: &ActionIo) -> ActionOutcome {
        let Some(documents) = node.details.get(&DetailKey::Documents).and_then(|v| v.as_array()) else {
            return ActionOutcome::permanent_failure("save requires documents");
        };
        let documents: Vec<String> = documents.iter().filter_map(|v| v.as_str().map(String::from)).collect();
        if documents.is_empty() {
            return ActionOutcome::permanent_failure("save requires at least one document");
        }
        let metadatas: Vec<serde_json::Value> = node
            .details
            .get(&DetailKey::Metadatas)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_else(|| vec![serde_json::json!({}); documents.len()]);

        match io.vector_store.save(documents, metadatas).await {
            Ok(ids) => ActionOutcome::ok(serde_json::json!({ "ids": ids })),
            Err(e) if e.is_retryable() => ActionOutcome::retryable_failure(e.to_string()),
            Err(e) => ActionOutcome::permanent_failure(e.to_string()),
        }
    }
}
