//! Flat, env-driven configuration shared by every binary. Loaded once at
//! startup; never reloaded mid-task.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_max_children")]
    pub max_children: u32,
    #[serde(default = "default_decomposition_threshold")]
    pub decomposition_threshold: f64,
    #[serde(default)]
    pub allow_unscored_selection: bool,
    #[serde(default = "default_min_score_threshold")]
    pub min_score_threshold: f64,
    #[serde(default = "default_true")]
    pub enable_recursive_merge: bool,
    #[serde(default = "default_action_max_retries")]
    pub action_max_retries: u32,
    #[serde(default = "default_backoff_steps")]
    pub action_retry_backoff_steps: Vec<u64>,
}

fn default_max_depth() -> u32 {
    4
}
fn default_max_children() -> u32 {
    4
}
fn default_decomposition_threshold() -> f64 {
    0.6
}
fn default_min_score_threshold() -> f64 {
    0.0
}
fn default_true() -> bool {
    true
}
fn default_action_max_retries() -> u32 {
    2
}
fn default_backoff_steps() -> Vec<u64> {
    vec![1, 2, 4, 8]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_children: default_max_children(),
            decomposition_threshold: default_decomposition_threshold(),
            allow_unscored_selection: false,
            min_score_threshold: default_min_score_threshold(),
            enable_recursive_merge: default_true(),
            action_max_retries: default_action_max_retries(),
            action_retry_backoff_steps: default_backoff_steps(),
        }
    }
}

impl EngineConfig {
    /// Exponential backoff in seconds for the given (1-indexed) attempt
    /// number, clamped to the last configured step.
    pub fn backoff_secs(&self, attempt: u32) -> u64 {
        let idx = (attempt.saturating_sub(1)) as usize;
        self.action_retry_backoff_steps
            .get(idx)
            .copied()
            .unwrap_or_else(|| self.action_retry_backoff_steps.last().copied().unwrap_or(1))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AutoscaleConfig {
    #[serde(default)]
    pub min_workers: i64,
    #[serde(default = "default_max_workers")]
    pub max_workers: i64,
    #[serde(default = "default_target_per_worker")]
    pub target_messages_per_worker: i64,
    #[serde(default = "default_namespace")]
    pub metric_namespace: String,
}

fn default_max_workers() -> i64 {
    10
}
fn default_target_per_worker() -> i64 {
    5
}
fn default_namespace() -> String {
    "Euglena/RabbitMQ".to_string()
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            min_workers: 0,
            max_workers: default_max_workers(),
            target_messages_per_worker: default_target_per_worker(),
            metric_namespace: default_namespace(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_input_queue")]
    pub input_queue: String,
    #[serde(default = "default_status_queue")]
    pub status_queue: String,
    pub broker_url: String,
}

fn default_input_queue() -> String {
    "agent.mandates".to_string()
}
fn default_status_queue() -> String {
    "agent.status".to_string()
}

/// Resolve an environment variable by trying each name in `names` in order,
/// the way the teacher resolves aliased env vars for the same setting.
pub fn env_first(names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| std::env::var(n).ok())
}
