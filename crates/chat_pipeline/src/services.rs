//! Service container: the dependency-injection root.
//!
//! Constructed once at process start and passed down by `Arc`; holds the
//! expensive provider clients and composed services. Everything here is
//! read-only after initialization and safe for concurrent reuse.

use std::sync::Arc;

use agent_client::{AgentBackend, HttpAgentClient};
use async_trait::async_trait;
use blob_store::{BlobStorage, HttpBlobStorage, TempSandbox};
use chat_core::{AppConfig, ModelCatalog};
use provider_llm::{AuxModel, HttpAuxModel, HttpTranscriber, ProviderConfig, Transcriber};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::rag::search::{HttpSearchClient, SearchClient};
use crate::rag::KnowledgeBaseRegistry;

/// One web search hit.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default)]
    pub date: Option<String>,
}

/// Web-search tool contract used by the tool-router enricher.
#[async_trait]
pub trait WebSearchClient: Send + Sync {
    async fn search(&self, query: &str, top_k: usize)
        -> Result<Vec<WebSearchResult>, PipelineError>;
}

/// HTTP web-search implementation.
pub struct HttpWebSearchClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpWebSearchClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl WebSearchClient for HttpWebSearchClient {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<WebSearchResult>, PipelineError> {
        let response = self
            .client
            .post(format!("{}/web/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&serde_json::json!({ "query": query, "top": top_k }))
            .send()
            .await
            .map_err(|e| PipelineError::Internal(format!("web search: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Internal(format!(
                "web search HTTP {}",
                response.status()
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Internal(format!("web search body: {e}")))?;
        serde_json::from_value(value["results"].clone())
            .map_err(|e| PipelineError::Internal(format!("web search results: {e}")))
    }
}

/// Process-wide service wiring.
pub struct ServiceContainer {
    pub config: AppConfig,
    pub catalog: ModelCatalog,
    pub providers: ProviderConfig,
    pub blob: Arc<dyn BlobStorage>,
    pub sandbox: TempSandbox,
    pub transcriber: Arc<dyn Transcriber>,
    pub aux: Arc<dyn AuxModel>,
    pub search: Arc<dyn SearchClient>,
    pub web_search: Arc<dyn WebSearchClient>,
    pub agents: Arc<dyn AgentBackend>,
    pub knowledge_bases: KnowledgeBaseRegistry,
}

impl ServiceContainer {
    /// Wire the production HTTP clients from configuration.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let sandbox = TempSandbox::new(&config.temp_root)?;
        let providers = ProviderConfig::from(&config);

        Ok(Self {
            catalog: ModelCatalog::builtin(),
            providers,
            blob: Arc::new(HttpBlobStorage::new(
                config.blob_endpoint.clone(),
                config.blob_api_key.clone(),
            )),
            sandbox,
            transcriber: Arc::new(HttpTranscriber::new(
                config.transcription_endpoint.clone(),
                config.transcription_api_key.clone(),
            )),
            aux: Arc::new(HttpAuxModel::new(
                config.openai_compatible_base.clone(),
                config.openai_compatible_api_key.clone(),
                config.aux_model.clone(),
            )),
            search: Arc::new(HttpSearchClient::new(
                config.search_endpoint.clone(),
                config.search_api_key.clone(),
                config.search_index.clone(),
            )),
            web_search: Arc::new(HttpWebSearchClient::new(
                config.search_endpoint.clone(),
                config.search_api_key.clone(),
            )),
            agents: Arc::new(HttpAgentClient::new(
                config.agent_endpoint.clone(),
                config.agent_api_key.clone(),
            )),
            knowledge_bases: KnowledgeBaseRegistry::builtin(),
            config,
        })
    }
}
