//! End-to-end handler tests against a mock provider.

use chat_core::{Message, ModelCatalog};
use futures_util::StreamExt;
use provider_llm::{handler_for, ChatChunk, ChatOutcome, ChatRequest, ProviderConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        azure_endpoint: server.uri(),
        azure_api_key: "k".into(),
        openai_base: format!("{}/v1", server.uri()),
        openai_api_key: "k".into(),
        anthropic_base: format!("{}/v1", server.uri()),
        anthropic_api_key: "k".into(),
    }
}

#[tokio::test]
async fn azure_streaming_normalizes_chunks() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-4o/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let model = ModelCatalog::builtin().resolve("gpt-4o").unwrap().clone();
    let handler = handler_for(&model, &config_for(&server));
    let mut request = ChatRequest::new(model, vec![Message::user("hi")]);
    request.stream = true;

    let outcome = handler.execute(&request).await.unwrap();
    let ChatOutcome::Stream(mut stream) = outcome else {
        panic!("expected stream");
    };

    let mut text = String::new();
    let mut saw_done = false;
    while let Some(chunk) = stream.next().await {
        match chunk.unwrap() {
            ChatChunk::Delta(delta) => text.push_str(&delta),
            ChatChunk::Done { .. } => saw_done = true,
        }
    }
    assert_eq!(text, "Hello");
    assert!(saw_done);
}

#[tokio::test]
async fn anthropic_streaming_normalizes_to_same_shape() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: message_start\ndata: {\"message\":{}}\n\n",
        "event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
        "event: message_stop\ndata: {}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let model = ModelCatalog::builtin()
        .resolve("claude-sonnet")
        .unwrap()
        .clone();
    let handler = handler_for(&model, &config_for(&server));
    let mut request = ChatRequest::new(model, vec![Message::user("hi")]);
    request.stream = true;

    let outcome = handler.execute(&request).await.unwrap();
    let ChatOutcome::Stream(mut stream) = outcome else {
        panic!("expected stream");
    };

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.unwrap());
    }
    assert_eq!(chunks[0], ChatChunk::Delta("Hi".into()));
    assert!(matches!(chunks.last(), Some(ChatChunk::Done { .. })));
}

#[tokio::test]
async fn non_streaming_completion_returns_full_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "Hello there" } }]
        })))
        .mount(&server)
        .await;

    let model = ModelCatalog::builtin()
        .resolve("deepseek-chat")
        .unwrap()
        .clone();
    let handler = handler_for(&model, &config_for(&server));
    let request = ChatRequest::new(model, vec![Message::user("hi")]);

    match handler.execute(&request).await.unwrap() {
        ChatOutcome::Completion(text) => assert_eq!(text, "Hello there"),
        ChatOutcome::Stream(_) => panic!("expected completion"),
    }
}

#[tokio::test]
async fn auth_failures_surface_as_auth_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let model = ModelCatalog::builtin().resolve("gpt-4o").unwrap().clone();
    let handler = handler_for(&model, &config_for(&server));
    let request = ChatRequest::new(model, vec![Message::user("hi")]);

    let err = handler.execute(&request).await.unwrap_err();
    assert!(matches!(err, provider_llm::LLMError::Auth(_)));
}
