//! Default selection policy: highest-scored non-terminal child.

use crate::base::SelectionPolicy;
use orchestrator_core::{IdeaDag, NodeId};

pub struct BestScoreSelectionPolicy {
    pub require_score: bool,
}

impl BestScoreSelectionPolicy {
    pub fn new(require_score: bool) -> Self {
        Self { require_score }
    }
}

impl SelectionPolicy for BestScoreSelectionPolicy {
    fn select(&self, dag: &IdeaDag, parent_id: &NodeId) -> Option<NodeId> {
        dag.select_best_child(parent_id, self.require_score)
    }
}
