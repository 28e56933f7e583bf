//! The Idea DAG reasoning engine: the tick algorithm that drives a DAG from
//! its root mandate to a terminal status, plus the telemetry and final
//! synthesis that wrap one run.

pub mod engine;
pub mod final_output;
pub mod telemetry;

pub use engine::{IdeaDagEngine, RunOutcome};
pub use final_output::FinalOutputBuilder;
pub use telemetry::{TelemetrySession, TelemetrySummary, TraceEvent, TraceRecorder};
