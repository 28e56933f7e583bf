//! Leaf action registry: the capability-set pattern for polymorphic action
//! dispatch, one concrete implementation per [`ActionType`].

use crate::io::ActionIo;
use orchestrator_core::{ActionType, IdeaNode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub struct ActionOutcome {
    pub success: bool,
    pub retryable: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok(result: serde_json::Value) -> Self {
        Self { success: true, retryable: false, result: Some(result), error: None }
    }

    pub fn retryable_failure(error: impl Into<String>) -> Self {
        Self { success: false, retryable: true, result: None, error: Some(error.into()) }
    }

    pub fn permanent_failure(error: impl Into<String>) -> Self {
        Self { success: false, retryable: false, result: None, error: Some(error.into()) }
    }
}

#[async_trait::async_trait]
pub trait LeafAction: Send + Sync {
    fn action_type(&self) -> ActionType;

    /// Validate that the node carries the inputs this action needs.
    fn validate(&self, node: &IdeaNode) -> Result<(), String>;

    async fn execute(&self, node: &IdeaNode, io: &ActionIo) -> ActionOutcome;

    /// Execute with cancellation support. Default: race execution against
    /// cancellation, reporting a retryable failure on interrupt so the
    /// engine's retry path handles it uniformly.
    async fn execute_cancellable(
        &self,
        node: &IdeaNode,
        io: &ActionIo,
        cancel: CancellationToken,
    ) -> ActionOutcome {
        tokio::select! {
            outcome = self.execute(node, io) => outcome,
            _ = cancel.cancelled() => ActionOutcome::retryable_failure("cancelled"),
        }
    }
}

pub struct ActionRegistry {
    actions: HashMap<ActionType, Arc<dyn LeafAction>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self { actions: HashMap::new() }
    }

    pub fn register(&mut self, action: impl LeafAction + 'static) {
        self.actions.insert(action.action_type(), Arc::new(action));
    }

    pub fn get(&self, action_type: ActionType) -> Option<Arc<dyn LeafAction>> {
        self.actions.get(&action_type).cloned()
    }
}

/// The default registry wiring all four leaf actions.
pub fn default_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register(crate::actions::SearchAction);
    registry.register(crate::actions::VisitAction);
    registry.register(crate::actions::ThinkAction);
    registry.register(crate::actions::SaveAction);
    registry
}
