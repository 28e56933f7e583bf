//! Search provider: queries a SearXNG-compatible JSON search API.

use crate::io::{IoError, IoResult, SearchHit, SearchProvider};
use reqwest::Client;
use serde::Deserialize;

pub struct SearxSearchProvider {
    client: Client,
    base_url: String,
}

impl SearxSearchProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into() }
    }
}

#[derive(Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Deserialize)]
struct SearxResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait::async_trait]
impl SearchProvider for SearxSearchProvider {
    async fn search(&self, query: &str, n_results: usize) -> IoResult<Vec<SearchHit>> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IoError::RequestFailed(format!("search returned {}", response.status())));
        }
        let parsed: SearxResponse = response.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .take(n_results)
            .map(|r| SearchHit { title: r.title, url: r.url, description: r.content })
            .collect())
    }
}
