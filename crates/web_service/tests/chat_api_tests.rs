//! HTTP-level tests for the chat endpoint.

use std::sync::Arc;

use actix_web::{test, web, App};
use agent_client::{AgentBackend, AgentEventStream, RunCapabilities};
use async_trait::async_trait;
use blob_store::{BlobStorage, StoreError, TempSandbox};
use bytes::Bytes;
use chat_core::{AppConfig, ModelCatalog};
use chat_pipeline::rag::search::{SearchClient, SearchDoc};
use chat_pipeline::rag::KnowledgeBaseRegistry;
use chat_pipeline::services::{ServiceContainer, WebSearchClient, WebSearchResult};
use chat_pipeline::PipelineError;
use provider_llm::{AuxModel, PendingTranscription, ProviderConfig, Transcriber};
use serde_json::{json, Value};
use web_service::server::{app_config, AppState};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct EmptyBlob;

#[async_trait]
impl BlobStorage for EmptyBlob {
    async fn get_blob_size(&self, path: &str) -> blob_store::Result<u64> {
        Err(StoreError::NotFound(path.to_string()))
    }

    async fn get(&self, path: &str) -> blob_store::Result<Bytes> {
        Err(StoreError::NotFound(path.to_string()))
    }

    async fn blob_exists(&self, _path: &str) -> blob_store::Result<bool> {
        Ok(false)
    }
}

struct StubTranscriber;

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _audio: Bytes, _file_name: &str) -> provider_llm::Result<String> {
        Ok(String::new())
    }

    async fn submit_chunked(
        &self,
        _audio: Bytes,
        file_name: &str,
    ) -> provider_llm::Result<PendingTranscription> {
        Ok(PendingTranscription {
            job_id: "job".into(),
            chunk_count: 1,
            file_name: file_name.to_string(),
        })
    }
}

struct StubAux;

#[async_trait]
impl AuxModel for StubAux {
    async fn structured(&self, _system: &str, _user: &str) -> provider_llm::Result<Value> {
        Ok(json!({}))
    }

    async fn complete(&self, _system: &str, _user: &str) -> provider_llm::Result<String> {
        Ok(String::new())
    }
}

struct EmptySearch;

#[async_trait]
impl SearchClient for EmptySearch {
    async fn hybrid_search(
        &self,
        _query: &str,
        _top_k: usize,
        _semantic_configuration: &str,
        _vector_field: &str,
    ) -> Result<Vec<SearchDoc>, PipelineError> {
        Ok(Vec::new())
    }
}

struct EmptyWebSearch;

#[async_trait]
impl WebSearchClient for EmptyWebSearch {
    async fn search(
        &self,
        _query: &str,
        _top_k: usize,
    ) -> Result<Vec<WebSearchResult>, PipelineError> {
        Ok(Vec::new())
    }
}

struct NoAgent;

#[async_trait]
impl AgentBackend for NoAgent {
    async fn create_thread(&self) -> agent_client::Result<String> {
        Ok("t".into())
    }

    async fn append_message(
        &self,
        _thread_id: &str,
        _role: &str,
        _content: &str,
    ) -> agent_client::Result<()> {
        Ok(())
    }

    async fn stream_run(
        &self,
        _agent_id: &str,
        _thread_id: &str,
        _capabilities: &RunCapabilities,
        _temperature: Option<f32>,
    ) -> agent_client::Result<AgentEventStream> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn upload_file(
        &self,
        _name: &str,
        _content: Bytes,
        _purpose: &str,
    ) -> agent_client::Result<String> {
        Ok("f".into())
    }

    async fn file_content(&self, _file_id: &str) -> agent_client::Result<Bytes> {
        Ok(Bytes::new())
    }

    async fn delete_file(&self, _file_id: &str) -> agent_client::Result<()> {
        Ok(())
    }
}

fn state_with_provider(provider: &MockServer) -> web::Data<AppState> {
    let mut config = AppConfig::from_env();
    config.azure_openai_endpoint = provider.uri();
    let temp = std::env::temp_dir().join(format!("chat-api-tests-{}", std::process::id()));
    let services = Arc::new(ServiceContainer {
        catalog: ModelCatalog::builtin(),
        providers: ProviderConfig::from(&config),
        blob: Arc::new(EmptyBlob),
        sandbox: TempSandbox::new(temp).expect("sandbox"),
        transcriber: Arc::new(StubTranscriber),
        aux: Arc::new(StubAux),
        search: Arc::new(EmptySearch),
        web_search: Arc::new(EmptyWebSearch),
        agents: Arc::new(NoAgent),
        knowledge_bases: KnowledgeBaseRegistry::builtin(),
        config,
    });
    web::Data::new(AppState { services })
}

#[actix_web::test]
async fn chat_returns_completion_text() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/openai/deployments/.*/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Hi there" } }]
        })))
        .mount(&provider)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_with_provider(&provider))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/v1/chat")
        .set_json(json!({
            "model": "gpt-4o",
            "messages": [{ "role": "user", "content": "Hello" }]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body = test::read_body(resp).await;
    assert_eq!(body, Bytes::from_static(b"Hi there"));
}

#[actix_web::test]
async fn unknown_fields_fail_validation() {
    let provider = MockServer::start().await;
    let app = test::init_service(
        App::new()
            .app_data(state_with_provider(&provider))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/v1/chat")
        .set_json(json!({
            "model": "gpt-4o",
            "messages": [{ "role": "user", "content": "Hello" }],
            "unexpected": 1
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn health_route_reports_ok() {
    let provider = MockServer::start().await;
    let app = test::init_service(
        App::new()
            .app_data(state_with_provider(&provider))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::get().uri("/v1/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}
