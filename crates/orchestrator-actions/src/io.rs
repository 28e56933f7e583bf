//! The external collaborators a leaf action can call: web search, page
//! fetch, vector store, and the LLM. Each is a narrow trait so a worker can
//! swap in a test double without touching action logic.

use orchestrator_llm::LlmProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl IoError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, IoError::RequestFailed(_) | IoError::NetworkError(_))
    }
}

pub type IoResult<T> = Result<T, IoError>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, n_results: usize) -> IoResult<Vec<SearchHit>>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> IoResult<FetchedPage>;
}

#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist `documents` (with parallel `metadatas`), returning one
    /// deterministic id per document.
    async fn save(&self, documents: Vec<String>, metadatas: Vec<serde_json::Value>) -> IoResult<Vec<String>>;

    async fn retrieve(&self, query: &str, n_results: usize) -> IoResult<Vec<String>>;
}

/// The capability bundle every leaf action receives.
#[derive(Clone)]
pub struct ActionIo {
    pub search: Arc<dyn SearchProvider>,
    pub fetch: Arc<dyn PageFetcher>,
    pub vector_store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LlmProvider>,
}
