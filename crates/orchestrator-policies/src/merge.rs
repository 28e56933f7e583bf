//! Default merge policy: fold every child's result into its expansion
//! parent, then attach a terminal MERGE child representing completion of
//! that branch, propagating recursively toward the root.

use crate::base::{MergePolicy, MergeSummary};
use orchestrator_core::{ActionType, DetailKey, Details, Error, IdeaDag, NodeId, Result, Status};

pub struct SimpleMergePolicy {
    pub recursive: bool,
}

impl SimpleMergePolicy {
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }

    /// Recursively strip non-JSON-safe values (matching the original's
    /// sanitizer: only objects, arrays, strings, numbers, bools, and null
    /// survive; anything else is stringified).
    fn sanitize(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), Self::sanitize(v));
                }
                serde_json::Value::Object(out)
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::sanitize).collect())
            }
            other => other.clone(),
        }
    }

    fn child_result(dag: &IdeaDag, child_id: &NodeId) -> serde_json::Value {
        let Some(child) = dag.get(child_id) else { return serde_json::Value::Null };
        let result = if child.is_merge_node() {
            child
                .details
                .get(&DetailKey::MergedResults)
                .cloned()
                .unwrap_or(serde_json::Value::Null)
        } else {
            child
                .details
                .get(&DetailKey::ActionResult)
                .cloned()
                .unwrap_or(serde_json::Value::Null)
        };
        Self::sanitize(&serde_json::json!({
            "node_id": child.node_id.to_string(),
            "title": child.title,
            "status": child.status,
            "result": result,
        }))
    }
}

impl MergePolicy for SimpleMergePolicy {
    fn are_children_ready_to_merge(&self, dag: &IdeaDag, node_id: &NodeId) -> bool {
        let Some(node) = dag.get(node_id) else { return false };
        !node.children.is_empty()
            && node.children.iter().all(|c| dag.get(c).map(|n| n.status.is_terminal()).unwrap_or(false))
    }

    fn should_create_merge_node(&self, dag: &IdeaDag, node_id: &NodeId, _config: &orchestrator_core::EngineConfig) -> bool {
        if !self.recursive {
            return false;
        }
        let Some(node) = dag.get(node_id) else { return false };
        if node.children.len() < 2 {
            return false;
        }
        let has_merge_child = node.children.iter().any(|c| dag.get(c).map(|n| n.is_merge_node()).unwrap_or(false));
        !has_merge_child && self.are_children_ready_to_merge(dag, node_id)
    }

    fn create_merge_node(&self, dag: &mut IdeaDag, parent_id: &NodeId) -> Result<NodeId> {
        self.merge(dag, parent_id, false)?;

        let children = dag
            .get(parent_id)
            .ok_or_else(|| Error::node_not_found(parent_id.to_string()))?
            .children
            .clone();
        let mut fan_in = vec![parent_id.clone()];
        fan_in.extend(children);

        let summary = dag
            .get(parent_id)
            .and_then(|n| n.details.get(&DetailKey::MergeSummary).cloned());
        let merged_results = dag
            .get(parent_id)
            .and_then(|n| n.details.get(&DetailKey::MergedResults).cloned());
        let parent_failed = dag.get(parent_id).map(|n| n.status == Status::Failed).unwrap_or(false);

        let merge_id = dag.merge_nodes(&fan_in, "merge")?;
        let mut details = Details::new();
        details.insert(DetailKey::Action, serde_json::to_value(ActionType::Merge)?);
        if let Some(s) = summary {
            details.insert(DetailKey::MergeSummary, s);
        }
        if let Some(r) = merged_results {
            details.insert(DetailKey::MergedResults, r);
        }
        dag.update_details(&merge_id, details)?;
        let terminal_status = if parent_failed { Status::Failed } else { Status::Done };
        dag.update_status(&merge_id, terminal_status)?;

        // The expansion node itself only ever becomes terminal through its
        // MERGE child: mirror the merge child's terminal status onto the
        // parent so readiness/termination checks above it see a terminal
        // node, matching `BranchPair.is_complete()` in the original.
        dag.update_status(parent_id, terminal_status)?;

        if self.recursive {
            self.maybe_propagate(dag, parent_id)?;
        }
        Ok(merge_id)
    }

    fn merge(&self, dag: &mut IdeaDag, node_id: &NodeId, recursive: bool) -> Result<()> {
        let children = dag
            .get(node_id)
            .ok_or_else(|| Error::node_not_found(node_id.to_string()))?
            .children
            .clone();

        let merged_results: Vec<serde_json::Value> =
            children.iter().map(|c| Self::child_result(dag, c)).collect();

        let mut summary = MergeSummary { total: children.len(), ..Default::default() };
        for c in &children {
            match dag.get(c).map(|n| n.status) {
                Some(Status::Done) => summary.success += 1,
                Some(Status::Failed) => summary.failed += 1,
                Some(Status::Blocked) => summary.blocked += 1,
                Some(Status::Skipped) => summary.skipped += 1,
                _ => {}
            }
        }

        let mut details = Details::new();
        details.insert(DetailKey::MergedResults, serde_json::json!(merged_results));
        details.insert(DetailKey::MergeSummary, serde_json::to_value(&summary)?);
        dag.update_details(node_id, details)?;

        if summary.failed > 0 && summary.success == 0 && summary.blocked == 0 {
            let mut failure = Details::new();
            failure.insert(DetailKey::MergeFailure, serde_json::json!(format!("All {} children failed", summary.failed)));
            dag.update_details(node_id, failure)?;
            dag.update_status(node_id, Status::Failed)?;
        }

        if recursive {
            self.maybe_propagate(dag, node_id)?;
        }
        Ok(())
    }
}

impl SimpleMergePolicy {
    fn maybe_propagate(&self, dag: &mut IdeaDag, node_id: &NodeId) -> Result<()> {
        let Some(parent_id) = dag.get(node_id).and_then(|n| n.parent_id.clone()) else { return Ok(()) };
        if self.are_children_ready_to_merge(dag, &parent_id) && self.should_create_merge_node(
            dag,
            &parent_id,
            &orchestrator_core::EngineConfig::default(),
        ) {
            self.create_merge_node(dag, &parent_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::IdeaDag;

    fn leaf(dag: &mut IdeaDag, parent: &NodeId, title: &str, status: Status, result: serde_json::Value) -> NodeId {
        let mut details = Details::new();
        details.insert(DetailKey::Action, serde_json::json!("think"));
        details.insert(DetailKey::ActionResult, result);
        let id = dag.add_child(parent, title, details).unwrap();
        dag.update_status(&id, status).unwrap();
        id
    }

    #[test]
    fn merge_aggregates_counts_without_failing_parent_on_partial_success() {
        let mut dag = IdeaDag::new("root");
        let root = dag.root_id().clone();
        leaf(&mut dag, &root, "a", Status::Done, serde_json::json!({"text": "a"}));
        leaf(&mut dag, &root, "b", Status::Done, serde_json::json!({"text": "b"}));
        leaf(&mut dag, &root, "c", Status::Failed, serde_json::json!({"text": "c"}));

        let policy = SimpleMergePolicy::new(true);
        assert!(policy.are_children_ready_to_merge(&dag, &root));
        let merge_id = policy.create_merge_node(&mut dag, &root).unwrap();

        let root_node = dag.get(&root).unwrap();
        assert_ne!(root_node.status, Status::Failed);
        let summary: MergeSummary =
            serde_json::from_value(root_node.details.get(&DetailKey::MergeSummary).cloned().unwrap()).unwrap();
        assert_eq!(summary, MergeSummary { total: 3, success: 2, failed: 1, blocked: 0, skipped: 0 });

        let merge_node = dag.get(&merge_id).unwrap();
        assert_eq!(merge_node.status, Status::Done);
        assert!(merge_node.is_merge_node());
    }

    #[test]
    fn all_children_failed_fails_the_parent() {
        let mut dag = IdeaDag::new("root");
        let root = dag.root_id().clone();
        leaf(&mut dag, &root, "a", Status::Failed, serde_json::json!({}));
        leaf(&mut dag, &root, "b", Status::Failed, serde_json::json!({}));

        let policy = SimpleMergePolicy::new(true);
        policy.create_merge_node(&mut dag, &root).unwrap();
        assert_eq!(dag.get(&root).unwrap().status, Status::Failed);
        let failure = dag.get(&root).unwrap().details.get(&DetailKey::MergeFailure).cloned().unwrap();
        assert_eq!(failure, serde_json::json!("All 2 children failed"));
    }

    #[test]
    fn merge_child_completion_makes_the_expansion_node_terminal() {
        let mut dag = IdeaDag::new("root");
        let root = dag.root_id().clone();
        leaf(&mut dag, &root, "a", Status::Done, serde_json::json!({"text": "a"}));
        leaf(&mut dag, &root, "b", Status::Done, serde_json::json!({"text": "b"}));

        let policy = SimpleMergePolicy::new(true);
        policy.create_merge_node(&mut dag, &root).unwrap();

        // The expansion node (root) itself must go terminal once its MERGE
        // child completes, not just the MERGE child — otherwise nothing
        // above it, including `run()`'s root-terminal check, ever fires.
        assert!(dag.get(&root).unwrap().status.is_terminal());
        assert_eq!(dag.get(&root).unwrap().status, Status::Done);
    }

    #[test]
    fn merge_propagates_through_an_intermediate_expansion_node() {
        let mut dag = IdeaDag::new("root");
        let root = dag.root_id().clone();
        let branch = dag.add_child(&root, "branch", Details::new()).unwrap();
        leaf(&mut dag, &branch, "a", Status::Done, serde_json::json!({"text": "a"}));
        leaf(&mut dag, &branch, "b", Status::Done, serde_json::json!({"text": "b"}));

        let policy = SimpleMergePolicy::new(true);
        assert!(policy.are_children_ready_to_merge(&dag, &branch));
        policy.create_merge_node(&mut dag, &branch).unwrap();

        // `branch` is terminal now, so it counts as ready for its own
        // parent (`root`) the same way a leaf child would.
        assert!(dag.get(&branch).unwrap().status.is_terminal());
        assert!(policy.are_children_ready_to_merge(&dag, &root));
    }
}
