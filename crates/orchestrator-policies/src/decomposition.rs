//! Default decomposition policy: decompose while shallow and unconfident,
//! unless children are already wrapping up (let merging happen instead).

use crate::base::DecompositionPolicy;
use orchestrator_core::{EngineConfig, IdeaDag, NodeId};

pub struct ScoreThresholdDecompositionPolicy;

impl DecompositionPolicy for ScoreThresholdDecompositionPolicy {
    fn should_decompose(&self, dag: &IdeaDag, node_id: &NodeId, config: &EngineConfig) -> bool {
        let Some(node) = dag.get(node_id) else { return false };
        if node.action().is_some() {
            return false;
        }
        let depth = dag.depth(node_id);
        let score = node.score.unwrap_or(f64::NEG_INFINITY);
        if depth as u32 >= config.max_depth || score >= config.decomposition_threshold {
            return false;
        }
        if !node.children.is_empty()
            && node.children.iter().all(|c| {
                dag.get(c).map(|n| n.status.is_terminal()).unwrap_or(false)
            })
        {
            // Children are already done; let merge policy take it from here.
            return false;
        }
        true
    }
}
