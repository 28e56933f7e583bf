//! Orchestrator core: the Idea DAG data model, the task contract, shared
//! configuration, and error handling. No I/O lives here.

pub mod branch;
pub mod config;
pub mod contract;
pub mod dag;
pub mod error;

pub use branch::{find_branch_pair, get_completion_path, BranchPair};
pub use config::{env_first, AutoscaleConfig, EngineConfig, QueueConfig};
pub use contract::{CompletionResult, StatusEnvelope, StatusType, TaskEnvelope, TaskRecord, TaskState};
pub use dag::{normalize_aliases, ActionType, DetailKey, Details, IdeaDag, IdeaNode, NodeId, Status};
pub use error::{Error, Result};
