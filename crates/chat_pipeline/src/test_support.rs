//! Hand-rolled in-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agent_client::{AgentBackend, AgentEvent, AgentEventStream, RunCapabilities};
use async_trait::async_trait;
use blob_store::{BlobStorage, StoreError, TempSandbox};
use bytes::Bytes;
use chat_core::{AppConfig, Message, ModelCatalog, Principal};
use provider_llm::{
    AuxModel, LLMError, PendingTranscription, ProviderConfig, Transcriber,
};
use serde_json::{json, Value};

use crate::context::{ChatContext, ChatRequestInput, CodeInterpreterMode, SearchMode};
use crate::error::PipelineError;
use crate::rag::search::{SearchClient, SearchDoc};
use crate::rag::KnowledgeBaseRegistry;
use crate::services::{ServiceContainer, WebSearchClient, WebSearchResult};

#[derive(Default)]
pub struct MemoryBlobStorage {
    pub blobs: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobStorage {
    pub fn insert(&self, path: &str, content: impl Into<Bytes>) {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), content.into());
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn get_blob_size(&self, path: &str) -> blob_store::Result<u64> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .map(|b| b.len() as u64)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn get(&self, path: &str) -> blob_store::Result<Bytes> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn blob_exists(&self, path: &str) -> blob_store::Result<bool> {
        Ok(self.blobs.lock().unwrap().contains_key(path))
    }
}

pub struct StubTranscriber;

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _audio: Bytes, file_name: &str) -> provider_llm::Result<String> {
        Ok(format!("transcript of {file_name}"))
    }

    async fn submit_chunked(
        &self,
        audio: Bytes,
        file_name: &str,
    ) -> provider_llm::Result<PendingTranscription> {
        Ok(PendingTranscription {
            job_id: "job-1".to_string(),
            chunk_count: (audio.len() / (1024 * 1024)).max(1) as u32,
            file_name: file_name.to_string(),
        })
    }
}

/// Aux model returning canned JSON keyed by a substring of the system
/// prompt, or failing when configured to.
#[derive(Default)]
pub struct StubAuxModel {
    pub structured_response: Mutex<Option<Value>>,
    pub fail: bool,
}

#[async_trait]
impl AuxModel for StubAuxModel {
    async fn structured(&self, _system: &str, _user: &str) -> provider_llm::Result<Value> {
        if self.fail {
            return Err(LLMError::Api("stub failure".into()));
        }
        Ok(self
            .structured_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| json!({ "query": "stub query" })))
    }

    async fn complete(&self, _system: &str, user: &str) -> provider_llm::Result<String> {
        if self.fail {
            return Err(LLMError::Api("stub failure".into()));
        }
        let prefix: String = user.chars().take(40).collect();
        Ok(format!("summary: {prefix}"))
    }
}

#[derive(Default)]
pub struct StubSearchClient {
    pub docs: Mutex<Vec<SearchDoc>>,
    pub fail: bool,
}

#[async_trait]
impl SearchClient for StubSearchClient {
    async fn hybrid_search(
        &self,
        _query: &str,
        _top_k: usize,
        _semantic_configuration: &str,
        _vector_field: &str,
    ) -> Result<Vec<SearchDoc>, PipelineError> {
        if self.fail {
            return Err(PipelineError::Internal("search down".into()));
        }
        Ok(self.docs.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct StubWebSearchClient {
    pub results: Mutex<Vec<WebSearchResult>>,
}

#[async_trait]
impl WebSearchClient for StubWebSearchClient {
    async fn search(
        &self,
        _query: &str,
        _top_k: usize,
    ) -> Result<Vec<WebSearchResult>, PipelineError> {
        Ok(self.results.lock().unwrap().clone())
    }
}

/// Agent backend that records calls and replays scripted events.
#[derive(Default)]
pub struct StubAgentBackend {
    pub events: Mutex<Vec<AgentEvent>>,
    pub uploaded: Mutex<Vec<String>>,
    pub appended: Mutex<Vec<String>>,
}

#[async_trait]
impl AgentBackend for StubAgentBackend {
    async fn create_thread(&self) -> agent_client::Result<String> {
        Ok("thread-new".to_string())
    }

    async fn append_message(
        &self,
        _thread_id: &str,
        _role: &str,
        content: &str,
    ) -> agent_client::Result<()> {
        self.appended.lock().unwrap().push(content.to_string());
        Ok(())
    }

    async fn stream_run(
        &self,
        _agent_id: &str,
        _thread_id: &str,
        _capabilities: &RunCapabilities,
        _temperature: Option<f32>,
    ) -> agent_client::Result<AgentEventStream> {
        let events = self.events.lock().unwrap().clone();
        Ok(Box::pin(futures::stream::iter(
            events.into_iter().map(Ok),
        )))
    }

    async fn upload_file(
        &self,
        name: &str,
        _content: Bytes,
        _purpose: &str,
    ) -> agent_client::Result<String> {
        self.uploaded.lock().unwrap().push(name.to_string());
        Ok(format!("file-{}", self.uploaded.lock().unwrap().len()))
    }

    async fn file_content(&self, _file_id: &str) -> agent_client::Result<Bytes> {
        Ok(Bytes::new())
    }

    async fn delete_file(&self, _file_id: &str) -> agent_client::Result<()> {
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::from_env();
    config.active_file_token_budget = 100;
    config.max_file_bytes = 10 * 1024 * 1024;
    config.audio_sync_threshold_bytes = 25 * 1024 * 1024;
    config
}

/// Container wired entirely with in-memory stubs.
pub fn container() -> Arc<ServiceContainer> {
    container_with(
        Arc::new(MemoryBlobStorage::default()),
        Arc::new(StubAuxModel::default()),
        Arc::new(StubSearchClient::default()),
        Arc::new(StubAgentBackend::default()),
    )
}

pub fn container_with_web(web_search: Arc<dyn WebSearchClient>) -> Arc<ServiceContainer> {
    let mut base = container_with(
        Arc::new(MemoryBlobStorage::default()),
        Arc::new(StubAuxModel::default()),
        Arc::new(StubSearchClient::default()),
        Arc::new(StubAgentBackend::default()),
    );
    Arc::get_mut(&mut base).expect("unique container").web_search = web_search;
    base
}

pub fn container_with(
    blob: Arc<dyn BlobStorage>,
    aux: Arc<dyn AuxModel>,
    search: Arc<dyn SearchClient>,
    agents: Arc<dyn AgentBackend>,
) -> Arc<ServiceContainer> {
    let config = test_config();
    let temp = std::env::temp_dir().join(format!("chat-pipeline-test-{}", std::process::id()));
    Arc::new(ServiceContainer {
        catalog: ModelCatalog::builtin(),
        providers: ProviderConfig::from(&config),
        blob,
        sandbox: TempSandbox::new(temp).expect("test sandbox"),
        transcriber: Arc::new(StubTranscriber),
        aux,
        search,
        web_search: Arc::new(StubWebSearchClient::default()),
        agents,
        knowledge_bases: KnowledgeBaseRegistry::builtin(),
        config,
    })
}

pub fn input_with_user_text(text: &str) -> ChatRequestInput {
    input_with_messages(vec![Message::user(text)])
}

pub fn input_with_messages(messages: Vec<Message>) -> ChatRequestInput {
    ChatRequestInput {
        model: ModelCatalog::builtin().resolve("gpt-4o").unwrap().clone(),
        messages,
        system_prompt: None,
        temperature: None,
        stream: false,
        reasoning_effort: None,
        verbosity: None,
        bot_id: None,
        search_mode: SearchMode::Auto,
        agent_mode: false,
        code_interpreter_mode: CodeInterpreterMode::Off,
        thread_id: None,
        tone: None,
        streaming_speed_ms: None,
        active_files: Vec::new(),
    }
}

pub fn context() -> ChatContext {
    context_with_user_text("hello")
}

pub fn context_with_user_text(text: &str) -> ChatContext {
    ChatContext::new(Principal::new("u1", "u1@example.org"), input_with_user_text(text))
}
