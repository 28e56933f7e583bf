//! The worker loop: poll the input queue, run a mandate to completion or
//! budget exhaustion, synthesize the final deliverable, persist the task
//! record, and publish status updates at every stage transition.

use crate::broker::Broker;
use crate::logging::{log_error_with_context, log_queue_operation, log_task_operation};
use crate::store::TaskStore;
use orchestrator_core::{
    CompletionResult, Error, QueueConfig, Result, StatusEnvelope, StatusType, TaskEnvelope,
    TaskRecord, TaskState,
};
use orchestrator_engine::{FinalOutputBuilder, IdeaDagEngine, TelemetrySession};
use orchestrator_llm::LlmProvider;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one worker process needs to pull tasks off a queue and drive
/// them to completion.
pub struct Worker {
    pub broker: Arc<dyn Broker>,
    pub store: Arc<dyn TaskStore>,
    pub engine: Arc<IdeaDagEngine>,
    pub llm: Arc<dyn LlmProvider>,
    pub synthesis_model: String,
    pub queues: QueueConfig,
    pub poll_interval: std::time::Duration,
}

impl Worker {
    /// Run forever, polling `queues.input_queue`, until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match self.broker.consume_one(&self.queues.input_queue).await {
                Ok(Some(payload)) => {
                    let envelope: TaskEnvelope = serde_json::from_slice(&payload)
                        .map_err(|e| Error::InvalidEnvelope(e.to_string()))?;
                    log_queue_operation("CONSUMED", &self.queues.input_queue, Some(&envelope.correlation_id), None);
                    if let Err(e) = self.process_task(envelope, cancel.clone()).await {
                        log_error_with_context(&e, "process_task", None);
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = cancel.cancelled() => return Ok(()),
                    }
                }
                Err(e) => {
                    log_error_with_context(&e, "consume_one", None);
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = cancel.cancelled() => return Ok(()),
                    }
                }
            }
        }
    }

    /// Drive one mandate from acceptance to a terminal status envelope,
    /// persisting and publishing along the way.
    pub async fn process_task(&self, envelope: TaskEnvelope, cancel: CancellationToken) -> Result<()> {
        let correlation_id = envelope.correlation_id.clone();

        // Redelivery guard: a broker-redelivered envelope for a task we've
        // already finished is acked without doing the work again.
        if let Some(existing) = self.store.get(&correlation_id).await? {
            if matches!(existing.status, TaskState::Completed | TaskState::Failed) {
                log_task_operation("SKIPPED_REDELIVERY", &correlation_id, Some("already terminal"), None);
                return Ok(());
            }
        }

        log_task_operation("ACCEPTED", &correlation_id, Some("pending"), None);

        let mut record = TaskRecord::pending(correlation_id.clone(), None, envelope.mandate.clone(), envelope.max_ticks);
        self.store.put(record.clone()).await?;
        self.publish_status(StatusEnvelope::new(StatusType::Accepted, envelope.mandate.clone(), correlation_id.clone())).await?;

        let mut started = StatusEnvelope::new(StatusType::Started, envelope.mandate.clone(), correlation_id.clone());
        started.tick = Some(0);
        started.max_ticks = Some(envelope.max_ticks);
        record.apply_status(&started)?;
        self.store.put(record.clone()).await?;
        self.publish_status(started).await?;

        let mut dag = orchestrator_core::IdeaDag::new(envelope.mandate.clone());
        let root = dag.root_id().clone();
        let telemetry = TelemetrySession::disabled(correlation_id.clone());

        // An engine-internal invariant violation is fatal for this task:
        // surface it as `error`, fail the record, and stop — this is the
        // one path that is NOT a `completed {success=false}`.
        let outcome = match self.engine.run(&mut dag, envelope.max_ticks, &telemetry, &cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log_error_with_context(&e, "engine_run", Some(&correlation_id));
                let mut error_envelope = StatusEnvelope::new(StatusType::Error, envelope.mandate.clone(), correlation_id.clone());
                error_envelope.error = Some(e.to_string());
                record.apply_status(&error_envelope)?;
                self.store.put(record).await?;
                self.publish_status(error_envelope).await?;
                return Ok(());
            }
        };
        let summary = telemetry.finish();

        let mut in_progress = StatusEnvelope::new(StatusType::InProgress, envelope.mandate.clone(), correlation_id.clone());
        in_progress.tick = Some(outcome.ticks_consumed);
        in_progress.max_ticks = Some(envelope.max_ticks);
        record.apply_status(&in_progress)?;
        self.store.put(record.clone()).await?;
        self.publish_status(in_progress).await?;

        if outcome.cancelled {
            log_task_operation("CANCELLED", &correlation_id, Some("in_progress"), None);
        }

        let history = collect_history(&dag, &root);
        let notes = collect_notes(&dag, &root);
        let deliverables = collect_deliverables(&dag, &root);
        let retrieved_context: Vec<String> = Vec::new();

        let builder = FinalOutputBuilder {
            mandate: &envelope.mandate,
            history: &history,
            notes: &notes,
            deliverables: &deliverables,
            retrieved_context: &retrieved_context,
            ticks_consumed: outcome.ticks_consumed,
        };

        let success = outcome.final_status == orchestrator_core::Status::Done
            && !outcome.cancelled
            && !outcome.budget_exhausted;
        let (final_deliverable, action_summary) = match builder.build(self.llm.as_ref(), &self.synthesis_model).await {
            Ok(pair) => pair,
            Err(e) => {
                log_error_with_context(&e, "final_synthesis", Some(&correlation_id));
                (String::new(), format!("synthesis failed: {e}"))
            }
        };

        let result = CompletionResult {
            correlation_id: Some(correlation_id.clone()),
            success,
            deliverables: deliverables.iter().map(|v| v.to_string()).collect(),
            notes: notes.clone(),
            final_deliverable,
            action_summary,
        };

        // `error` is reserved for system-level failure; an unsuccessful
        // mandate (FAILED/BLOCKED root, budget exhaustion, cancellation)
        // still completes with a best-effort deliverable.
        let mut completion = StatusEnvelope::new(StatusType::Completed, envelope.mandate.clone(), correlation_id.clone());
        completion.tick = Some(outcome.ticks_consumed);
        completion.max_ticks = Some(envelope.max_ticks);
        completion.history_length = Some(history.len());
        completion.notes_len = Some(notes.len());
        completion.deliverables_count = Some(result.deliverables.len());
        completion.result = Some(result);

        record.apply_status(&completion)?;
        self.store.put(record.clone()).await?;
        self.publish_status(completion).await?;

        log_task_operation(
            "COMPLETED",
            &correlation_id,
            Some(if success { "completed" } else { "failed" }),
            None,
        );
        let _ = summary;
        Ok(())
    }

    async fn publish_status(&self, envelope: StatusEnvelope) -> Result<()> {
        let payload = serde_json::to_vec(&envelope)?;
        self.broker.publish_status(&self.queues.status_queue, &payload).await?;
        log_queue_operation("PUBLISHED", &self.queues.status_queue, Some(&envelope.correlation_id), None);
        Ok(())
    }
}

fn collect_history(dag: &orchestrator_core::IdeaDag, root: &orchestrator_core::NodeId) -> Vec<String> {
    let mut out = Vec::new();
    walk(dag, root, &mut |node| {
        out.push(format!("[{:?}] {}", node.status, node.title));
    });
    out
}

fn collect_notes(dag: &orchestrator_core::IdeaDag, root: &orchestrator_core::NodeId) -> String {
    let mut notes = Vec::new();
    walk(dag, root, &mut |node| {
        if let Some(text) = node.details.get(&orchestrator_core::DetailKey::Text).and_then(|v| v.as_str()) {
            notes.push(text.to_string());
        }
    });
    notes.join("\n")
}

fn collect_deliverables(dag: &orchestrator_core::IdeaDag, root: &orchestrator_core::NodeId) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    walk(dag, root, &mut |node| {
        if let Some(result) = node.details.get(&orchestrator_core::DetailKey::ActionResult) {
            out.push(result.clone());
        }
    });
    out
}

fn walk(dag: &orchestrator_core::IdeaDag, node_id: &orchestrator_core::NodeId, f: &mut impl FnMut(&orchestrator_core::IdeaNode)) {
    let Some(node) = dag.get(node_id) else { return };
    f(node);
    for child in &node.children {
        walk(dag, child, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::store::InMemoryTaskStore;
    use orchestrator_actions::{ActionIo, ActionRegistry};
    use orchestrator_core::EngineConfig;
    use orchestrator_llm::{LlmRequest, LlmResponse, LlmResult};
    use orchestrator_policies::{
        BestScoreSelectionPolicy, InMemoryMemoizationPolicy, ScoreThresholdDecompositionPolicy,
        SimpleMergePolicy,
    };

    struct StubLlm;
    #[async_trait::async_trait]
    impl LlmProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }
        fn models(&self) -> &[&str] {
            &["stub"]
        }
        async fn complete(&self, _request: LlmRequest) -> LlmResult<LlmResponse> {
            Ok(LlmResponse {
                text: serde_json::json!({ "deliverable": "done", "summary": "finished" }).to_string(),
                usage: Default::default(),
                stop_reason: Some("end_turn".to_string()),
            })
        }
    }

    struct NoopExpansion;
    #[async_trait::async_trait]
    impl orchestrator_policies::ExpansionPolicy for NoopExpansion {
        async fn expand(&self, _dag: &orchestrator_core::IdeaDag, _node_id: &orchestrator_core::NodeId) -> orchestrator_core::Result<Vec<orchestrator_policies::ExpandedIdea>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn worker_completes_a_trivial_mandate_end_to_end() {
        let engine = Arc::new(IdeaDagEngine {
            expansion: Arc::new(NoopExpansion),
            evaluation: Arc::new(orchestrator_policies::LlmEvaluationPolicy::new(Arc::new(StubLlm), "stub")),
            selection: Arc::new(BestScoreSelectionPolicy::new(false)),
            decomposition: Arc::new(ScoreThresholdDecompositionPolicy),
            merge: Arc::new(SimpleMergePolicy::new(true)),
            memoization: Arc::new(InMemoryMemoizationPolicy::new()),
            actions: ActionRegistry::new(),
            io: ActionIo {
                search: Arc::new(orchestrator_actions::SearxSearchProvider::new("http://localhost")),
                fetch: Arc::new(orchestrator_actions::HttpPageFetcher::new()),
                vector_store: Arc::new(orchestrator_actions::ChromaVectorStore::new("http://localhost", "test")),
                llm: Arc::new(StubLlm),
            },
            config: EngineConfig::default(),
        });

        let worker = Worker {
            broker: Arc::new(InMemoryBroker::new()),
            store: Arc::new(InMemoryTaskStore::new()),
            engine,
            llm: Arc::new(StubLlm),
            synthesis_model: "stub".to_string(),
            queues: QueueConfig { input_queue: "in".to_string(), status_queue: "out".to_string(), broker_url: "amqp://unused".to_string() },
            poll_interval: std::time::Duration::from_millis(10),
        };

        let envelope = TaskEnvelope::new("a trivial mandate with nothing to decompose", "corr-test-1");
        worker.process_task(envelope, CancellationToken::new()).await.unwrap();

        let record = worker.store.get("corr-test-1").await.unwrap().unwrap();
        assert_eq!(record.status, TaskState::Completed);
    }
}
