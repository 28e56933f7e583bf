//! The tick-based Idea DAG engine: one call to [`IdeaDagEngine::step`]
//! advances exactly one node by one unit of work.

use crate::telemetry::TelemetrySession;
use orchestrator_actions::{ActionIo, ActionRegistry};
use orchestrator_core::{DetailKey, Details, EngineConfig, Error, IdeaDag, NodeId, Result, Status};
use orchestrator_policies::{DecompositionPolicy, EvaluationPolicy, ExpansionPolicy, MergePolicy, MemoizationPolicy, SelectionPolicy};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything [`IdeaDagEngine::step`] needs to classify and act on one node:
/// the pluggable strategies, the leaf action registry, the capability bundle
/// those actions call into, and the tuning knobs.
pub struct IdeaDagEngine {
    pub expansion: Arc<dyn ExpansionPolicy>,
    pub evaluation: Arc<dyn EvaluationPolicy>,
    pub selection: Arc<dyn SelectionPolicy>,
    pub decomposition: Arc<dyn DecompositionPolicy>,
    pub merge: Arc<dyn MergePolicy>,
    pub memoization: Arc<dyn MemoizationPolicy>,
    pub actions: ActionRegistry,
    pub io: ActionIo,
    pub config: EngineConfig,
}

#[derive(Clone, Copy, Debug)]
pub struct RunOutcome {
    pub final_status: Status,
    pub ticks_consumed: u32,
    pub budget_exhausted: bool,
    pub cancelled: bool,
}

impl IdeaDagEngine {
    /// A BLOCKED node is one whose action failed retryably and is waiting out
    /// its backoff; the selection policy skips it (it isn't "open work" in
    /// the branching sense), so target selection has to check for it
    /// directly or a cooled-down retry would never be picked back up.
    fn is_cooling_down(node: &orchestrator_core::IdeaNode) -> bool {
        node.details
            .get(&DetailKey::ActionCooldownUntil)
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|until| chrono::Utc::now() < until)
            .unwrap_or(false)
    }

    fn find_retry_ready_child(&self, dag: &IdeaDag, node_id: &NodeId) -> Option<NodeId> {
        let node = dag.get(node_id)?;
        node.children
            .iter()
            .find(|c| {
                dag.get(c)
                    .map(|n| n.status == Status::Blocked && !Self::is_cooling_down(n))
                    .unwrap_or(false)
            })
            .cloned()
    }

    /// Walk from `root_id` toward the node that needs work this tick: prefer
    /// a BLOCKED child whose cooldown has elapsed (it's due for retry),
    /// otherwise descend through the highest-scored non-terminal child at
    /// each level, stopping at the first node with no actionable children
    /// (leaf, exhausted decomposition, or a fully-terminal branch ready to
    /// merge).
    fn select_target(&self, dag: &IdeaDag, root_id: &NodeId) -> Option<NodeId> {
        let mut cur = root_id.clone();
        loop {
            let node = dag.get(&cur)?;
            if node.status.is_terminal() {
                return None;
            }
            if node.children.is_empty() {
                return Some(cur);
            }
            if let Some(retry) = self.find_retry_ready_child(dag, &cur) {
                cur = retry;
                continue;
            }
            match self.selection.select(dag, &cur) {
                Some(next) => cur = next,
                None => return Some(cur),
            }
        }
    }

    /// A branch collapsed to a single terminal child can never get a
    /// conventional merge node (merge requires at least two fan-in parents);
    /// its status and result are copied straight up instead.
    fn needs_passthrough(&self, dag: &IdeaDag, node_id: &NodeId) -> bool {
        let Some(node) = dag.get(node_id) else { return false };
        node.action().is_none()
            && node.children.len() == 1
            && dag.get(&node.children[0]).map(|c| c.status.is_terminal()).unwrap_or(false)
    }

    fn passthrough(&self, dag: &mut IdeaDag, node_id: &NodeId) -> Result<()> {
        let node = dag.get(node_id).ok_or_else(|| Error::node_not_found(node_id.to_string()))?;
        let child_id = node.children[0].clone();
        let child = dag.get(&child_id).ok_or_else(|| Error::node_not_found(child_id.to_string()))?;
        let status = child.status;
        let result = if child.is_merge_node() {
            child.details.get(&DetailKey::MergedResults).cloned()
        } else {
            child.details.get(&DetailKey::ActionResult).cloned()
        };

        let mut details = Details::new();
        if let Some(r) = result {
            details.insert(DetailKey::MergedResults, r);
        }
        dag.update_details(node_id, details)?;
        dag.update_status(node_id, status)?;
        Ok(())
    }

    async fn expand_node(&self, dag: &mut IdeaDag, node_id: &NodeId) -> Result<()> {
        let ideas = self.expansion.expand(dag, node_id).await?;
        if ideas.is_empty() {
            dag.update_status(node_id, Status::Skipped)?;
            return Ok(());
        }
        let ids = dag.expand(node_id, ideas)?;
        let unscored: Vec<NodeId> = ids
            .iter()
            .filter(|id| dag.get(id).map(|n| n.score.is_none()).unwrap_or(false))
            .cloned()
            .collect();
        if !unscored.is_empty() {
            let scores = self.evaluation.evaluate_batch(dag, node_id, &unscored).await?;
            for (id, score) in scores {
                dag.evaluate(&id, score)?;
            }
        }
        dag.update_status(node_id, Status::Active)?;
        Ok(())
    }

    async fn execute_action(
        &self,
        dag: &mut IdeaDag,
        node_id: &NodeId,
        telemetry: &TelemetrySession,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let node = dag.get(node_id).ok_or_else(|| Error::node_not_found(node_id.to_string()))?.clone();
        let Some(action_type) = node.action() else {
            return Err(Error::InvalidDetail(format!("{node_id} has no action")));
        };
        let Some(action) = self.actions.get(action_type) else {
            dag.update_status(node_id, Status::Failed)?;
            return Ok(());
        };

        if let Err(msg) = action.validate(&node) {
            let mut details = Details::new();
            details.insert(DetailKey::ActionError, serde_json::json!(msg));
            dag.update_details(node_id, details)?;
            dag.update_status(node_id, Status::Failed)?;
            return Ok(());
        }

        if let Some(cooldown) = node.details.get(&DetailKey::ActionCooldownUntil).and_then(|v| v.as_str()) {
            if let Ok(until) = chrono::DateTime::parse_from_rfc3339(cooldown) {
                if chrono::Utc::now() < until {
                    return Ok(());
                }
            }
        }

        if let Some(key) = self.memoization.memo_key(dag, node_id) {
            if let Some(cached) = self.memoization.lookup(&key) {
                let mut details = Details::new();
                details.insert(DetailKey::ActionResult, cached);
                dag.update_details(node_id, details)?;
                dag.update_status(node_id, Status::Done)?;
                telemetry.record_event("memo_hit", serde_json::json!({ "node_id": node_id.to_string() }));
                return Ok(());
            }
        }

        dag.update_status(node_id, Status::Active)?;
        let outcome = action.execute_cancellable(&node, &self.io, cancel.clone()).await;
        let attempts = node.details.get(&DetailKey::ActionAttempts).and_then(|v| v.as_u64()).unwrap_or(0) + 1;

        if outcome.success {
            let result = outcome.result.unwrap_or(serde_json::Value::Null);
            let mut details = Details::new();
            details.insert(DetailKey::ActionResult, result.clone());
            details.insert(DetailKey::ActionAttempts, serde_json::json!(attempts));
            dag.update_details(node_id, details)?;
            dag.update_status(node_id, Status::Done)?;
            if let Some(key) = self.memoization.memo_key(dag, node_id) {
                self.memoization.store(&key, result);
            }
            telemetry.record_event(
                "action_done",
                serde_json::json!({ "node_id": node_id.to_string(), "action": action_type }),
            );
        } else if outcome.retryable && attempts < self.config.action_max_retries {
            let backoff = self.config.backoff_secs(attempts);
            let until = chrono::Utc::now() + chrono::Duration::seconds(backoff as i64);
            let mut details = Details::new();
            details.insert(DetailKey::ActionAttempts, serde_json::json!(attempts));
            details.insert(DetailKey::ActionCooldownUntil, serde_json::json!(until.to_rfc3339()));
            details.insert(DetailKey::ActionError, serde_json::json!(outcome.error));
            details.insert(DetailKey::ActionRetryable, serde_json::json!(true));
            dag.update_details(node_id, details)?;
            dag.update_status(node_id, Status::Blocked)?;
            telemetry.record_event(
                "action_retry_scheduled",
                serde_json::json!({ "node_id": node_id.to_string(), "attempt": attempts, "backoff_secs": backoff }),
            );
        } else {
            let mut details = Details::new();
            details.insert(DetailKey::ActionAttempts, serde_json::json!(attempts));
            details.insert(DetailKey::ActionError, serde_json::json!(outcome.error));
            details.insert(DetailKey::ActionRetryable, serde_json::json!(false));
            dag.update_details(node_id, details)?;
            dag.update_status(node_id, Status::Failed)?;
            telemetry.record_event(
                "action_failed",
                serde_json::json!({ "node_id": node_id.to_string(), "error": outcome.error }),
            );
        }
        Ok(())
    }

    /// Once a top-level branch's merge child has gone terminal, its
    /// already-folded children no longer need their bulky payloads kept
    /// around; `MergeSummary` stays (it's small and still informative).
    fn gc_terminal_branches(&self, dag: &mut IdeaDag, root_id: &NodeId) {
        let Some(root) = dag.get(root_id) else { return };
        let top_children = root.children.clone();
        for branch_id in top_children {
            let Some(branch) = dag.get(&branch_id) else { continue };
            let has_done_merge_child = branch
                .children
                .iter()
                .any(|c| dag.get(c).map(|n| n.is_merge_node() && n.status.is_terminal()).unwrap_or(false));
            if !has_done_merge_child {
                continue;
            }
            let folded: Vec<NodeId> = branch
                .children
                .iter()
                .filter(|c| dag.get(c).map(|n| !n.is_merge_node()).unwrap_or(false))
                .cloned()
                .collect();
            for id in folded {
                if let Some(node) = dag.get_mut(&id) {
                    if node.status.is_terminal() {
                        node.details.remove(&DetailKey::ActionResult);
                        node.details.remove(&DetailKey::Documents);
                        node.details.remove(&DetailKey::MergedResults);
                    }
                }
            }
        }
    }

    /// Advance the DAG by one unit of work. Never blocks on anything except
    /// the single action (if any) this tick performs, and that action itself
    /// races against `cancel`.
    pub async fn step(
        &self,
        dag: &mut IdeaDag,
        root_id: &NodeId,
        tick_index: u32,
        telemetry: &TelemetrySession,
        cancel: &CancellationToken,
    ) -> Result<()> {
        telemetry.record_tick(tick_index);
        self.gc_terminal_branches(dag, root_id);

        let Some(target) = self.select_target(dag, root_id) else {
            return Ok(());
        };

        if let Some(action_type) = dag.get(&target).and_then(|n| n.action()) {
            if action_type.is_leaf() {
                return self.execute_action(dag, &target, telemetry, cancel).await;
            }
        }

        if self.needs_passthrough(dag, &target) {
            return self.passthrough(dag, &target);
        }

        if self.merge.should_create_merge_node(dag, &target, &self.config) {
            self.merge.create_merge_node(dag, &target)?;
            return Ok(());
        }

        let is_open_leaf = dag.get(&target).map(|n| n.children.is_empty() && n.action().is_none()).unwrap_or(false);
        if is_open_leaf {
            if self.decomposition.should_decompose(dag, &target, &self.config) {
                self.expand_node(dag, &target).await?;
            } else {
                dag.update_status(&target, Status::Skipped)?;
            }
        }

        Ok(())
    }

    /// Run ticks until the root reaches a terminal status, the tick budget
    /// is exhausted, or `cancel` fires.
    pub async fn run(
        &self,
        dag: &mut IdeaDag,
        max_ticks: u32,
        telemetry: &TelemetrySession,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let root_id = dag.root_id().clone();
        let mut tick = 0;
        let mut cancelled = false;

        while tick < max_ticks {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            tick += 1;
            self.step(dag, &root_id, tick, telemetry, cancel).await?;
            if dag.get(&root_id).map(|n| n.status.is_terminal()).unwrap_or(true) {
                break;
            }
        }

        let root = dag.get(&root_id).ok_or_else(|| Error::node_not_found(root_id.to_string()))?;
        let final_status = root.status;
        Ok(RunOutcome {
            final_status,
            ticks_consumed: tick,
            budget_exhausted: tick >= max_ticks && !final_status.is_terminal(),
            cancelled,
        })
    }
}
