//! The autoscaler: a queue-depth publisher and a desired-count controller,
//! both stateless single-shot invocations on their own schedule (§4.6).

use crate::metrics::MetricsSink;
use crate::runtime::WorkerRuntime;
use orchestrator_core::{AutoscaleConfig, QueueConfig, Result};
use orchestrator_worker::Broker;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// `desired = clamp(max(max(1, MIN), ceil(depth / TARGET)), max(1, MIN), MAX)`,
/// ported verbatim from the original autoscaler's policy: zero depth maps
/// straight to the floor, never to zero workers.
pub fn calculate_desired_workers(queue_depth: i64, config: &AutoscaleConfig) -> i64 {
    let min_workers = config.min_workers.max(1);
    if queue_depth == 0 {
        return min_workers;
    }
    let desired = div_ceil(queue_depth, config.target_messages_per_worker.max(1));
    desired.clamp(min_workers, config.max_workers).max(min_workers)
}

fn div_ceil(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

pub struct QueueDepthPublisher {
    pub broker: Arc<dyn Broker>,
    pub metrics: Arc<dyn MetricsSink>,
    pub queues: QueueConfig,
    pub config: AutoscaleConfig,
    pub interval: std::time::Duration,
}

impl QueueDepthPublisher {
    pub async fn sample_once(&self) -> Result<u32> {
        let depth = self.broker.queue_depth(&self.queues.input_queue).await?;
        self.metrics.publish_queue_depth(&self.config.metric_namespace, &self.queues.input_queue, depth).await?;
        Ok(depth)
    }

    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if let Err(e) = self.sample_once().await {
                tracing::warn!(error = %e, "queue depth sample failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }
}

pub struct AutoscaleController {
    pub broker: Arc<dyn Broker>,
    pub runtime: Arc<dyn WorkerRuntime>,
    pub queues: QueueConfig,
    pub config: AutoscaleConfig,
    pub interval: std::time::Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleAction {
    None,
    ScaleIn { from: u32, to: u32 },
    ScaleOut { from: u32, to: u32 },
}

impl AutoscaleController {
    /// One controller tick: sample depth directly from the broker (no
    /// dependency on the publisher having run), compute the desired count,
    /// and reconcile it against the runtime. A missing current count is
    /// logged and skipped rather than guessed at.
    pub async fn tick_once(&self) -> Result<ScaleAction> {
        let depth = self.broker.queue_depth(&self.queues.input_queue).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "queue depth unavailable, treating as 0");
            0
        });

        let Some(current) = self.runtime.current_desired_count().await? else {
            tracing::warn!("current worker count unavailable, skipping this tick");
            return Ok(ScaleAction::None);
        };

        let desired = calculate_desired_workers(depth as i64, &self.config).max(0) as u32;
        if desired == current {
            tracing::info!(current, queue_depth = depth, "no scaling needed");
            return Ok(ScaleAction::None);
        }

        self.runtime.set_desired_count(desired).await?;
        if desired < current {
            Ok(ScaleAction::ScaleIn { from: current, to: desired })
        } else {
            Ok(ScaleAction::ScaleOut { from: current, to: desired })
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            match self.tick_once().await {
                Ok(action) => {
                    if !matches!(action, ScaleAction::None) {
                        tracing::info!(?action, "autoscaler reconciled desired count");
                    }
                }
                Err(e) => tracing::error!(error = %e, "autoscaler tick failed"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: i64, max: i64, target: i64) -> AutoscaleConfig {
        AutoscaleConfig { min_workers: min, max_workers: max, target_messages_per_worker: target, metric_namespace: "test".to_string() }
    }

    #[test]
    fn zero_depth_floors_to_min_workers() {
        assert_eq!(calculate_desired_workers(0, &config(0, 10, 5)), 1);
        assert_eq!(calculate_desired_workers(0, &config(3, 10, 5)), 3);
    }

    #[test]
    fn scales_proportionally_and_caps_at_max() {
        assert_eq!(calculate_desired_workers(9, &config(0, 10, 5)), 2);
        assert_eq!(calculate_desired_workers(100, &config(0, 10, 5)), 10);
    }

    #[test]
    fn never_goes_below_floored_min() {
        assert_eq!(calculate_desired_workers(1, &config(5, 10, 5)), 5);
    }
}
