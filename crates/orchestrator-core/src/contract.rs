//! The task contract: wire envelopes, the durable task record, and the
//! state machine that governs transitions between them.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Envelope published to the input queue to start one task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub mandate: String,
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u32,
    pub correlation_id: String,
}

fn default_max_ticks() -> u32 {
    50
}

impl TaskEnvelope {
    pub fn new(mandate: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            mandate: mandate.into(),
            max_ticks: default_max_ticks(),
            correlation_id: correlation_id.into(),
        }
    }
}

/// Status envelope type published by a worker over the lifetime of a task.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusType {
    Accepted,
    Started,
    InProgress,
    Completed,
    Error,
}

/// Result payload carried by a `completed` status envelope. Field names
/// match the canonical keys the task store and final deliverable expect.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompletionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub final_deliverable: String,
    #[serde(default)]
    pub action_summary: String,
}

/// Envelope published to the status queue by a worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusEnvelope {
    #[serde(rename = "type")]
    pub kind: StatusType,
    pub mandate: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CompletionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deliverables_count: Option<usize>,
}

impl StatusEnvelope {
    pub fn new(kind: StatusType, mandate: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            kind,
            mandate: mandate.into(),
            correlation_id: correlation_id.into(),
            seq: None,
            ts: Some(chrono::Utc::now()),
            tick: None,
            max_ticks: None,
            result: None,
            error: None,
            history_length: None,
            notes_len: None,
            deliverables_count: None,
        }
    }
}

/// Durable task state. Transitions are monotonic:
/// `Pending -> Accepted -> InProgress -> (Completed | Failed)`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Failed,
}

impl TaskState {
    /// Map a status envelope's `type` onto the corresponding task state.
    pub fn from_status_type(kind: StatusType) -> Self {
        match kind {
            StatusType::Accepted | StatusType::Started => TaskState::Accepted,
            StatusType::InProgress => TaskState::InProgress,
            StatusType::Completed => TaskState::Completed,
            StatusType::Error => TaskState::Failed,
        }
    }

    /// Whether moving from `self` to `next` is an allowed, forward-only
    /// transition. `Completed`/`Failed` are sinks.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        if matches!(self, Completed | Failed) {
            return false;
        }
        match (self, next) {
            (Pending, Accepted | InProgress | Completed | Failed) => true,
            (Accepted, InProgress | Completed | Failed) => true,
            (InProgress, InProgress | Completed | Failed) => true,
            _ => false,
        }
    }
}

/// Canonical record stored for one task's lifecycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRecord {
    pub correlation_id: String,
    pub user_id: Option<String>,
    pub status: TaskState,
    pub mandate: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub result: Option<CompletionResult>,
    pub error: Option<String>,
    pub tick: Option<u32>,
    pub max_ticks: u32,
}

impl TaskRecord {
    pub fn pending(
        correlation_id: impl Into<String>,
        user_id: Option<String>,
        mandate: impl Into<String>,
        max_ticks: u32,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            correlation_id: correlation_id.into(),
            user_id,
            status: TaskState::Pending,
            mandate: mandate.into(),
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            tick: None,
            max_ticks,
        }
    }

    /// Apply a status envelope to this record, enforcing monotonic
    /// transitions. A non-advancing envelope (stale redelivery, e.g. a
    /// broker-redelivered duplicate) is silently ignored rather than
    /// erroring — it is expected traffic, not a bug.
    pub fn apply_status(&mut self, envelope: &StatusEnvelope) -> Result<()> {
        let next = TaskState::from_status_type(envelope.kind);
        if next == self.status {
            self.tick = envelope.tick.or(self.tick);
            self.updated_at = chrono::Utc::now();
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Ok(());
        }
        self.status = next;
        self.tick = envelope.tick.or(self.tick);
        self.result = envelope.result.clone().or_else(|| self.result.clone());
        self.error = envelope.error.clone().or_else(|| self.error.clone());
        self.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_monotonic() {
        let mut record = TaskRecord::pending("c1", None, "do a thing", 50);
        record
            .apply_status(&StatusEnvelope::new(StatusType::Accepted, "do a thing", "c1"))
            .unwrap();
        assert_eq!(record.status, TaskState::Accepted);

        let mut in_progress = StatusEnvelope::new(StatusType::InProgress, "do a thing", "c1");
        in_progress.tick = Some(1);
        record.apply_status(&in_progress).unwrap();
        assert_eq!(record.status, TaskState::InProgress);
        assert_eq!(record.tick, Some(1));

        record
            .apply_status(&StatusEnvelope::new(StatusType::Completed, "do a thing", "c1"))
            .unwrap();
        assert_eq!(record.status, TaskState::Completed);
    }

    #[test]
    fn stale_redelivery_does_not_regress_status() {
        let mut record = TaskRecord::pending("c1", None, "m", 50);
        record
            .apply_status(&StatusEnvelope::new(StatusType::Completed, "m", "c1"))
            .unwrap();
        let late = StatusEnvelope::new(StatusType::InProgress, "m", "c1");
        record.apply_status(&late).unwrap();
        assert_eq!(record.status, TaskState::Completed);
    }
}
