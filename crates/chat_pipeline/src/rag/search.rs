//! Hybrid search client contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::PipelineError;

/// One retrieved chunk with its reranker score.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SearchDoc {
    pub chunk: String,
    pub title: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub url: String,
    pub chunk_id: String,
    /// Semantic reranker score as returned by the backend
    pub score: f64,
}

/// Hybrid (vector + semantic) search contract.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn hybrid_search(
        &self,
        query: &str,
        top_k: usize,
        semantic_configuration: &str,
        vector_field: &str,
    ) -> Result<Vec<SearchDoc>, PipelineError>;
}

/// HTTP implementation against a hybrid search index.
pub struct HttpSearchClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    index: String,
}

impl HttpSearchClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            index: index.into(),
        }
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn hybrid_search(
        &self,
        query: &str,
        top_k: usize,
        semantic_configuration: &str,
        vector_field: &str,
    ) -> Result<Vec<SearchDoc>, PipelineError> {
        let body = json!({
            "search": query,
            "top": top_k,
            "queryType": "semantic",
            "semanticConfiguration": semantic_configuration,
            "vectorQueries": [{
                "kind": "text",
                "text": query,
                "fields": vector_field,
            }],
        });

        let response = self
            .client
            .post(format!(
                "{}/indexes/{}/docs/search",
                self.base_url, self.index
            ))
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Internal(format!("search: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Internal(format!(
                "search HTTP {}",
                response.status()
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Internal(format!("search body: {e}")))?;

        let docs = value["value"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|doc| {
                Some(SearchDoc {
                    chunk: doc["chunk"].as_str()?.to_string(),
                    title: doc["title"].as_str().unwrap_or_default().to_string(),
                    date: doc["date"]
                        .as_str()
                        .and_then(|d| d.parse::<DateTime<Utc>>().ok()),
                    url: doc["url"].as_str().unwrap_or_default().to_string(),
                    chunk_id: doc["chunk_id"].as_str()?.to_string(),
                    score: doc["@search.rerankerScore"].as_f64().unwrap_or(0.0),
                })
            })
            .collect();

        Ok(docs)
    }
}
