//! Branch pair: the derived (expansion, merge) view over one decomposition
//! step.

use crate::dag::{IdeaDag, NodeId, Status};

/// The (expansion node, merge child) pair for one decomposition step.
#[derive(Clone, Debug)]
pub struct BranchPair {
    pub expansion_node_id: NodeId,
    pub merge_node_id: Option<NodeId>,
}

impl BranchPair {
    pub fn needs_expansion(&self, dag: &IdeaDag) -> bool {
        match dag.get(&self.expansion_node_id) {
            Some(node) => node.children.is_empty() && node.action().is_none(),
            None => false,
        }
    }

    pub fn needs_merge(&self, dag: &IdeaDag) -> bool {
        if self.merge_node_id.is_some() {
            return false;
        }
        let Some(node) = dag.get(&self.expansion_node_id) else { return false };
        !node.children.is_empty()
            && node
                .children
                .iter()
                .all(|c| dag.get(c).map(|n| n.status.is_terminal()).unwrap_or(false))
    }

    pub fn is_complete(&self, dag: &IdeaDag) -> bool {
        match &self.merge_node_id {
            Some(id) => dag.get(id).map(|n| n.status == Status::Done).unwrap_or(false),
            None => false,
        }
    }

    /// Non-merge children of the expansion node, in insertion order.
    pub fn get_intermediate_nodes(&self, dag: &IdeaDag) -> Vec<NodeId> {
        match dag.get(&self.expansion_node_id) {
            Some(node) => node
                .children
                .iter()
                .filter(|c| dag.get(c).map(|n| !n.is_merge_node()).unwrap_or(false))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Find the branch pair for `node_id`: the nearest ancestor (or itself) that
/// is an expansion node, paired with its merge child if one exists.
pub fn find_branch_pair(dag: &IdeaDag, node_id: &NodeId) -> Option<BranchPair> {
    let mut cur = node_id.clone();
    loop {
        let node = dag.get(&cur)?;
        if !node.children.is_empty() {
            let merge_node_id = node
                .children
                .iter()
                .find(|c| dag.get(c).map(|n| n.is_merge_node()).unwrap_or(false))
                .cloned();
            return Some(BranchPair {
                expansion_node_id: cur,
                merge_node_id,
            });
        }
        match &node.parent_id {
            Some(p) => cur = p.clone(),
            None => return Some(BranchPair {
                expansion_node_id: cur,
                merge_node_id: None,
            }),
        }
    }
}

/// The path from `node_id` up to the root, root first, via `parent_id`.
pub fn get_completion_path(dag: &IdeaDag, node_id: &NodeId) -> Vec<NodeId> {
    dag.path_to_root(node_id)
}
