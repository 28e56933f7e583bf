//! Default memoization policy: fingerprint a node's action + inputs and
//! cache its result, scoped by an optional namespace detail.

use crate::base::MemoizationPolicy;
use dashmap::DashMap;
use orchestrator_core::{DetailKey, IdeaDag, NodeId};

#[derive(Default)]
pub struct InMemoryMemoizationPolicy {
    cache: DashMap<String, serde_json::Value>,
}

impl InMemoryMemoizationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    fn fingerprint(action: &str, namespace: &str, inputs: &serde_json::Value) -> String {
        format!("{namespace}:{action}:{}", inputs)
    }
}

impl MemoizationPolicy for InMemoryMemoizationPolicy {
    fn memo_key(&self, dag: &IdeaDag, node_id: &NodeId) -> Option<String> {
        let node = dag.get(node_id)?;
        let action = node.action()?;
        if !action.is_leaf() {
            return None;
        }
        let namespace = node
            .details
            .get(&DetailKey::MemoNamespace)
            .and_then(|v| v.as_str())
            .unwrap_or("default")
            .to_string();
        let inputs = serde_json::json!({
            "query": node.details.get(&DetailKey::Query),
            "url": node.details.get(&DetailKey::Url),
            "text": node.details.get(&DetailKey::Text),
            "documents": node.details.get(&DetailKey::Documents),
        });
        Some(Self::fingerprint(&format!("{:?}", action), &namespace, &inputs))
    }

    fn lookup(&self, key: &str) -> Option<serde_json::Value> {
        self.cache.get(key).map(|v| v.clone())
    }

    fn store(&self, key: &str, value: serde_json::Value) {
        self.cache.insert(key.to_string(), value);
    }
}
