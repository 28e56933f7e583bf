//! Vector store: a thin client over ChromaDB's REST API, named to match the
//! `chroma_store`/`chroma_retrieve` telemetry events the original recorder
//! emits.

use crate::io::{IoError, IoResult, VectorStore};
use reqwest::Client;
use serde::Deserialize;
use idgen::stable_id;

pub struct ChromaVectorStore {
    client: Client,
    base_url: String,
    collection: String,
}

impl ChromaVectorStore {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into(), collection: collection.into() }
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/api/v1/collections/{}/{}", self.base_url, self.collection, suffix)
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<String>>,
}

#[async_trait::async_trait]
impl VectorStore for ChromaVectorStore {
    async fn save(&self, documents: Vec<String>, metadatas: Vec<serde_json::Value>) -> IoResult<Vec<String>> {
        let ids: Vec<String> = documents.iter().map(|d| stable_id(d)).collect();
        let body = serde_json::json!({
            "ids": ids,
            "documents": documents,
            "metadatas": metadatas,
        });
        let response = self.client.post(self.collection_url("add")).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(IoError::RequestFailed(format!("chroma add returned {}", response.status())));
        }
        Ok(ids)
    }

    async fn retrieve(&self, query: &str, n_results: usize) -> IoResult<Vec<String>> {
        let body = serde_json::json!({
            "query_texts": [query],
            "n_results": n_results,
        });
        let response = self.client.post(self.collection_url("query")).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(IoError::RequestFailed(format!("chroma query returned {}", response.status())));
        }
        let parsed: QueryResponse = response.json().await?;
        Ok(parsed.documents.into_iter().next().unwrap_or_default())
    }
}

/// Deterministic id generation for SAVE idempotence: identical document text
/// always yields the same vector-store id, so a retried SAVE never double
/// writes.
mod idgen {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    pub fn stable_id(text: &str) -> String {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        format!("doc-{:x}", hasher.finish())
    }
}
