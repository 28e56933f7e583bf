//! Policy traits. Each is a narrow strategy interface; the engine composes
//! them rather than subclassing a monolithic planner.

use orchestrator_core::{Details, EngineConfig, IdeaDag, NodeId, Result};

/// One candidate idea produced by expansion: a title, its details (which may
/// already fix a leaf `action`), and an optional prior score.
pub type ExpandedIdea = (String, Details, Option<f64>);

#[async_trait::async_trait]
pub trait ExpansionPolicy: Send + Sync {
    async fn expand(&self, dag: &IdeaDag, node_id: &NodeId) -> Result<Vec<ExpandedIdea>>;
}

#[async_trait::async_trait]
pub trait EvaluationPolicy: Send + Sync {
    async fn evaluate(&self, dag: &IdeaDag, node_id: &NodeId) -> Result<f64>;

    /// Evaluate a batch of freshly expanded children in one call where the
    /// policy can do so more cheaply than one-at-a-time.
    async fn evaluate_batch(
        &self,
        dag: &IdeaDag,
        parent_id: &NodeId,
        child_ids: &[NodeId],
    ) -> Result<std::collections::HashMap<NodeId, f64>> {
        let mut out = std::collections::HashMap::new();
        for id in child_ids {
            out.insert(id.clone(), self.evaluate(dag, id).await?);
        }
        let _ = parent_id;
        Ok(out)
    }
}

pub trait SelectionPolicy: Send + Sync {
    fn select(&self, dag: &IdeaDag, parent_id: &NodeId) -> Option<NodeId>;
}

pub trait DecompositionPolicy: Send + Sync {
    fn should_decompose(&self, dag: &IdeaDag, node_id: &NodeId, config: &EngineConfig) -> bool;
}

/// Aggregate counts recorded on an expansion node after a merge fold.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MergeSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub blocked: usize,
    pub skipped: usize,
}

pub trait MergePolicy: Send + Sync {
    /// True once every child of `node_id` is terminal (merge children count
    /// as ready even when they failed).
    fn are_children_ready_to_merge(&self, dag: &IdeaDag, node_id: &NodeId) -> bool;

    /// True iff a merge child should be created now: recursion enabled,
    /// ≥2 children, no existing merge child, and all children ready.
    fn should_create_merge_node(&self, dag: &IdeaDag, node_id: &NodeId, config: &EngineConfig) -> bool;

    /// Create the merge node for `parent_id`'s children, first folding their
    /// results into `parent_id`'s own details via [`MergePolicy::merge`].
    fn create_merge_node(&self, dag: &mut IdeaDag, parent_id: &NodeId) -> Result<NodeId>;

    /// Fold `node_id`'s children results into `merged_results` +
    /// `merge_summary`, recursing toward the root when `recursive` is set.
    fn merge(&self, dag: &mut IdeaDag, node_id: &NodeId, recursive: bool) -> Result<()>;
}

pub trait MemoizationPolicy: Send + Sync {
    /// A stable fingerprint for `node_id`'s action + inputs, or `None` if the
    /// node isn't memoizable.
    fn memo_key(&self, dag: &IdeaDag, node_id: &NodeId) -> Option<String>;

    /// A previously cached result for `key`, if any.
    fn lookup(&self, key: &str) -> Option<serde_json::Value>;

    /// Cache `value` under `key` for future reuse.
    fn store(&self, key: &str, value: serde_json::Value);
}
