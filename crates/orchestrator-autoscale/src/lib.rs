//! Queue-depth publishing and desired-worker-count control, both stateless
//! single-shot invocations scheduled independently (§4.6).

pub mod autoscale;
pub mod metrics;
pub mod runtime;

pub use autoscale::{calculate_desired_workers, AutoscaleController, QueueDepthPublisher, ScaleAction};
pub use metrics::{InMemoryMetricsSink, MetricsSink, TracingMetricsSink};
pub use runtime::{LoggingWorkerRuntime, WorkerRuntime};
