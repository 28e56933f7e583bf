//! LLM provider abstraction used by the THINK action and final synthesis.

pub mod anthropic;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use provider::{LlmError, LlmProvider, LlmResult};
pub use types::{LlmMessage, LlmRequest, LlmResponse, Usage};
