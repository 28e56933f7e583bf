//! The metrics boundary: where the queue-depth publisher (C11) sends its
//! scalar sample. Real deployments wire this to whatever metrics backend
//! they run; here it's `tracing` plus an in-memory double for tests.

use async_trait::async_trait;
use orchestrator_core::Result;
use std::sync::Mutex;

#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn publish_queue_depth(&self, namespace: &str, queue_name: &str, depth: u32) -> Result<()>;
}

pub struct TracingMetricsSink;

#[async_trait]
impl MetricsSink for TracingMetricsSink {
    async fn publish_queue_depth(&self, namespace: &str, queue_name: &str, depth: u32) -> Result<()> {
        tracing::info!(namespace, queue_name, depth, metric = "QueueDepth", "queue depth sample");
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMetricsSink {
    last: Mutex<Option<u32>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_value(&self) -> Option<u32> {
        *self.last.lock().unwrap()
    }
}

#[async_trait]
impl MetricsSink for InMemoryMetricsSink {
    async fn publish_queue_depth(&self, _namespace: &str, _queue_name: &str, depth: u32) -> Result<()> {
        *self.last.lock().unwrap() = Some(depth);
        Ok(())
    }
}
