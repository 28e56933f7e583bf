//! The Idea DAG data model: nodes, statuses, detail keys, and the graph
//! that owns them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Node identifier, cheaply cloneable.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Node lifecycle status.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pending,
    Active,
    Done,
    Failed,
    Blocked,
    Skipped,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::Skipped)
    }
}

/// The closed set of leaf action types a node's `action` detail can carry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Search,
    Visit,
    Think,
    Save,
    Merge,
}

impl ActionType {
    pub fn is_leaf(self) -> bool {
        !matches!(self, ActionType::Merge)
    }
}

/// Closed set of detail keys a node's `details` map may hold. Three
/// additional read-side aliases (`Prompt`, `Count`, `Document`) are accepted
/// during deserialization and normalized to their canonical key
/// (`Text`/`NResults`/`Documents`) on write, per the alias handling in
/// [`IdeaNode::normalize_aliases`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetailKey {
    Action,
    Query,
    Url,
    Link,
    Text,
    Pattern,
    Flags,
    Documents,
    Metadatas,
    Queries,
    #[serde(rename = "n_results")]
    NResults,
    Evaluation,
    Rationale,
    ActionResult,
    ActionResults,
    ActionAttempts,
    ActionMaxRetries,
    ActionCooldownUntil,
    ActionRetryable,
    ActionError,
    MergedResults,
    MergeSummary,
    MergeFailure,
    ExpansionMeta,
    ExecuteAllChildren,
    MemoNamespace,
    Intent,
    ParentGoal,
    IsLeaf,
    /// Alias for `Text` accepted on input.
    Prompt,
    /// Alias for `NResults` accepted on input.
    Count,
    /// Alias for `Documents` (singular) accepted on input.
    Document,
}

pub type Details = HashMap<DetailKey, serde_json::Value>;

/// Canonicalize input aliases in place: `prompt` -> `text`, `count` ->
/// `n_results`, `document` -> `documents`. The canonical key always wins if
/// both are present.
pub fn normalize_aliases(details: &mut Details) {
    for (alias, canonical) in [
        (DetailKey::Prompt, DetailKey::Text),
        (DetailKey::Count, DetailKey::NResults),
        (DetailKey::Document, DetailKey::Documents),
    ] {
        if let Some(v) = details.remove(&alias) {
            details.entry(canonical).or_insert(v);
        }
    }
}

/// A single node in the Idea DAG.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdeaNode {
    pub node_id: NodeId,
    pub title: String,
    pub status: Status,
    pub score: Option<f64>,
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub parent_ids: Vec<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    pub memo_key: Option<String>,
    #[serde(default)]
    pub details: Details,
}

impl IdeaNode {
    fn new(node_id: NodeId, title: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            node_id,
            title: title.into(),
            status: Status::Pending,
            score: None,
            parent_id,
            parent_ids: Vec::new(),
            children: Vec::new(),
            memo_key: None,
            details: Details::new(),
        }
    }

    /// All parent ids: the primary `parent_id` plus any additional merge
    /// parents in `parent_ids`.
    pub fn all_parents(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Some(p) = &self.parent_id {
            out.push(p.clone());
        }
        for p in &self.parent_ids {
            if !out.contains(p) {
                out.push(p.clone());
            }
        }
        out
    }

    pub fn action(&self) -> Option<ActionType> {
        self.details.get(&DetailKey::Action).and_then(|v| {
            serde_json::from_value::<ActionType>(v.clone()).ok()
        })
    }

    pub fn is_merge_node(&self) -> bool {
        self.action() == Some(ActionType::Merge) && self.all_parents().len() >= 2
    }

    pub fn is_leaf_action_node(&self) -> bool {
        matches!(self.action(), Some(a) if a.is_leaf()) && self.children.is_empty()
    }
}

/// An in-memory DAG of [`IdeaNode`]s rooted at a single mandate node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdeaDag {
    root_id: NodeId,
    nodes: HashMap<NodeId, IdeaNode>,
}

impl IdeaDag {
    pub fn new(root_title: impl Into<String>) -> Self {
        let root_id = NodeId::generate();
        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), IdeaNode::new(root_id.clone(), root_title, None));
        Self { root_id, nodes }
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root_id
    }

    pub fn get(&self, id: &NodeId) -> Option<&IdeaNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut IdeaNode> {
        self.nodes.get_mut(id)
    }

    fn require(&self, id: &NodeId) -> Result<&IdeaNode> {
        self.nodes.get(id).ok_or_else(|| Error::node_not_found(id.to_string()))
    }

    fn require_mut(&mut self, id: &NodeId) -> Result<&mut IdeaNode> {
        self.nodes.get_mut(id).ok_or_else(|| Error::node_not_found(id.to_string()))
    }

    /// Attach a new child under `parent_id`, returning the new node's id.
    pub fn add_child(
        &mut self,
        parent_id: &NodeId,
        title: impl Into<String>,
        mut details: Details,
    ) -> Result<NodeId> {
        self.require(parent_id)?;
        normalize_aliases(&mut details);
        let child_id = NodeId::generate();
        let mut node = IdeaNode::new(child_id.clone(), title, Some(parent_id.clone()));
        node.details = details;
        self.nodes.insert(child_id.clone(), node);
        self.require_mut(parent_id)?.children.push(child_id.clone());
        Ok(child_id)
    }

    /// Create a merge node whose parents are every id in `parent_ids`,
    /// registering it as a child of each of them.
    pub fn merge_nodes(
        &mut self,
        parent_ids: &[NodeId],
        title: impl Into<String>,
    ) -> Result<NodeId> {
        if parent_ids.len() < 2 {
            return Err(Error::InvalidParentage(
                "merge requires at least two parents".into(),
            ));
        }
        for p in parent_ids {
            self.require(p)?;
        }
        let merge_id = NodeId::generate();
        let mut details = Details::new();
        details.insert(DetailKey::Action, serde_json::json!("merge"));
        let mut node = IdeaNode::new(merge_id.clone(), title, Some(parent_ids[0].clone()));
        node.parent_ids = parent_ids[1..].to_vec();
        node.details = details;
        self.nodes.insert(merge_id.clone(), node);
        for p in parent_ids {
            self.require_mut(p)?.children.push(merge_id.clone());
        }
        Ok(merge_id)
    }

    pub fn update_status(&mut self, id: &NodeId, status: Status) -> Result<()> {
        self.require_mut(id)?.status = status;
        Ok(())
    }

    /// Shallow-merge `patch` into the node's details; alias keys are
    /// normalized before merging.
    pub fn update_details(&mut self, id: &NodeId, mut patch: Details) -> Result<()> {
        normalize_aliases(&mut patch);
        let node = self.require_mut(id)?;
        for (k, v) in patch {
            node.details.insert(k, v);
        }
        Ok(())
    }

    pub fn evaluate(&mut self, id: &NodeId, score: f64) -> Result<()> {
        self.require_mut(id)?.score = Some(score);
        Ok(())
    }

    pub fn set_title(&mut self, id: &NodeId, title: impl Into<String>) -> Result<()> {
        self.require_mut(id)?.title = title.into();
        Ok(())
    }

    /// Attach a batch of child ideas under `parent_id`, returning the new ids
    /// in the order supplied.
    pub fn expand(
        &mut self,
        parent_id: &NodeId,
        ideas: Vec<(String, Details, Option<f64>)>,
    ) -> Result<Vec<NodeId>> {
        let mut ids = Vec::with_capacity(ideas.len());
        for (title, details, score) in ideas {
            let id = self.add_child(parent_id, title, details)?;
            if let Some(s) = score {
                self.evaluate(&id, s)?;
            }
            ids.push(id);
        }
        Ok(ids)
    }

    /// Pick the highest-scored non-terminal child of `parent_id`. Ties break
    /// by insertion order. When `require_score` is set, unscored children are
    /// never selected.
    pub fn select_best_child(&self, parent_id: &NodeId, require_score: bool) -> Option<NodeId> {
        let parent = self.nodes.get(parent_id)?;
        let mut best: Option<(&NodeId, f64)> = None;
        for child_id in &parent.children {
            let Some(child) = self.nodes.get(child_id) else { continue };
            if child.status.is_terminal() || child.status == Status::Blocked {
                continue;
            }
            let score = match child.score {
                Some(s) => s,
                None if require_score => continue,
                None => f64::NEG_INFINITY,
            };
            match &best {
                Some((_, best_score)) if *best_score >= score => {}
                _ => best = Some((child_id, score)),
            }
        }
        best.map(|(id, _)| id.clone())
    }

    /// All nodes with no children, depth-first, insertion order.
    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        self.iter_depth_first()
            .into_iter()
            .filter(|id| self.nodes[id].children.is_empty())
            .collect()
    }

    /// Depth-first pre-order traversal starting at the root.
    pub fn iter_depth_first(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root_id.clone()];
        while let Some(id) = stack.pop() {
            out.push(id.clone());
            if let Some(node) = self.nodes.get(&id) {
                for child in node.children.iter().rev() {
                    stack.push(child.clone());
                }
            }
        }
        out
    }

    /// Depth of `id` from the root, following `parent_id` only (merge fan-in
    /// parents don't count toward depth).
    pub fn depth(&self, id: &NodeId) -> usize {
        let mut depth = 0;
        let mut cur = id.clone();
        while let Some(node) = self.nodes.get(&cur) {
            match &node.parent_id {
                Some(p) => {
                    depth += 1;
                    cur = p.clone();
                }
                None => break,
            }
        }
        depth
    }

    /// Walk from `id` to the root via `parent_id`, root first.
    pub fn path_to_root(&self, id: &NodeId) -> Vec<NodeId> {
        let mut path = vec![id.clone()];
        let mut cur = id.clone();
        while let Some(node) = self.nodes.get(&cur) {
            match &node.parent_id {
                Some(p) => {
                    path.push(p.clone());
                    cur = p.clone();
                }
                None => break,
            }
        }
        path.reverse();
        path
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_dict(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_child_maintains_parentage_invariant() {
        let mut dag = IdeaDag::new("root");
        let root = dag.root_id().clone();
        let child = dag.add_child(&root, "child", Details::new()).unwrap();
        assert!(dag.get(&root).unwrap().children.contains(&child));
        assert_eq!(dag.get(&child).unwrap().parent_id, Some(root));
    }

    #[test]
    fn merge_nodes_registers_child_on_every_parent() {
        let mut dag = IdeaDag::new("root");
        let root = dag.root_id().clone();
        let a = dag.add_child(&root, "a", Details::new()).unwrap();
        let b = dag.add_child(&root, "b", Details::new()).unwrap();
        let merge = dag.merge_nodes(&[a.clone(), b.clone()], "merge").unwrap();
        assert!(dag.get(&a).unwrap().children.contains(&merge));
        assert!(dag.get(&b).unwrap().children.contains(&merge));
        assert_eq!(dag.get(&merge).unwrap().all_parents().len(), 2);
        assert!(dag.get(&merge).unwrap().is_merge_node());
    }

    #[test]
    fn select_best_child_skips_terminal_and_blocked() {
        let mut dag = IdeaDag::new("root");
        let root = dag.root_id().clone();
        let a = dag.add_child(&root, "a", Details::new()).unwrap();
        let b = dag.add_child(&root, "b", Details::new()).unwrap();
        dag.evaluate(&a, 1.0).unwrap();
        dag.evaluate(&b, 5.0).unwrap();
        dag.update_status(&b, Status::Done).unwrap();
        assert_eq!(dag.select_best_child(&root, true), Some(a));
    }

    #[test]
    fn to_dict_from_dict_round_trips_root_id() {
        let mut dag = IdeaDag::new("root");
        let root = dag.root_id().clone();
        dag.add_child(&root, "child", Details::new()).unwrap();
        let dict = dag.to_dict();
        let restored = IdeaDag::from_dict(dict).unwrap();
        assert_eq!(restored.root_id(), &root);
        assert_eq!(restored.node_count(), dag.node_count());
    }

    #[test]
    fn alias_keys_normalize_into_canonical_keys() {
        let mut dag = IdeaDag::new("root");
        let root = dag.root_id().clone();
        let mut details = Details::new();
        details.insert(DetailKey::Prompt, serde_json::json!("hello"));
        let child = dag.add_child(&root, "child", details).unwrap();
        assert_eq!(
            dag.get(&child).unwrap().details.get(&DetailKey::Text),
            Some(&serde_json::json!("hello"))
        );
        assert!(!dag.get(&child).unwrap().details.contains_key(&DetailKey::Prompt));
    }
}
