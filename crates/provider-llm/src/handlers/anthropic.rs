//! Anthropic Messages API handler.
//!
//! The system prompt is a separate top-level parameter and the streaming
//! event shape differs from chat completions; events are translated into
//! the same normalized chunk shape so downstream stream processing is
//! provider-agnostic.

use async_trait::async_trait;
use chat_core::{ContentPart, MessageContent, Role};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{LLMError, Result};
use crate::sse::llm_stream_from_sse;
use crate::types::{ChatChunk, ChatOutcome, ChatRequest};

use super::{ProviderConfig, ProviderHandler};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicHandler {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicHandler {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.anthropic_base.trim_end_matches('/').to_string(),
            api_key: config.anthropic_api_key.clone(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| LLMError::Auth(format!("invalid API key: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// System-role history joined into the top-level system parameter.
    fn collect_system(&self, request: &ChatRequest) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(system) = &request.system_prompt {
            parts.push(system.clone());
        }
        for message in &request.messages {
            if message.role == Role::System {
                parts.push(message.text());
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

fn content_to_anthropic(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!([{ "type": "text", "text": text }]),
        MessageContent::Parts(parts) => {
            let blocks: Vec<Value> = parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentPart::ImageUrl { image_url } => Some(json!({
                        "type": "image",
                        "source": { "type": "url", "url": image_url.url },
                    })),
                    ContentPart::FileUrl { .. } | ContentPart::Thinking { .. } => None,
                })
                .collect();
            json!(blocks)
        }
    }
}

#[async_trait]
impl ProviderHandler for AnthropicHandler {
    fn shape_messages(&self, request: &ChatRequest) -> Vec<Value> {
        request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::User => "user",
                        _ => "assistant",
                    },
                    "content": content_to_anthropic(&m.content),
                })
            })
            .collect()
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": request.model.deployment,
            "max_tokens": request
                .max_output_tokens
                .unwrap_or(request.model.max_output_tokens),
            "stream": request.stream,
            "messages": self.shape_messages(request),
        });

        if let Some(system) = self.collect_system(request) {
            body["system"] = json!(system);
        }
        if request.model.supports_temperature {
            if let Some(temperature) = request.temperature {
                body["temperature"] = json!(temperature);
            }
        }

        body
    }

    async fn execute(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let body = self.build_body(request);
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(LLMError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.map_err(LLMError::Http)?;
            if status == 401 || status == 403 {
                return Err(LLMError::Auth(format!(
                    "Anthropic authentication failed: {text}"
                )));
            }
            return Err(LLMError::Api(format!("Anthropic HTTP {status}: {text}")));
        }

        if request.stream {
            let stream =
                llm_stream_from_sse(response, |event, data| parse_anthropic_event(event, data));
            Ok(ChatOutcome::Stream(stream))
        } else {
            let value: Value = response.json().await.map_err(LLMError::Http)?;
            let content = value["content"][0]["text"]
                .as_str()
                .ok_or_else(|| LLMError::Api(format!("completion missing content: {value}")))?;
            Ok(ChatOutcome::Completion(content.to_string()))
        }
    }
}

/// Translate one Anthropic SSE event into a normalized chunk.
fn parse_anthropic_event(event: &str, data: &str) -> Result<Option<ChatChunk>> {
    match event {
        "content_block_delta" => {
            let value: Value = serde_json::from_str(data)?;
            match value["delta"]["text"].as_str() {
                Some(text) if !text.is_empty() => Ok(Some(ChatChunk::Delta(text.to_string()))),
                _ => Ok(None),
            }
        }
        "message_delta" => {
            let value: Value = serde_json::from_str(data)?;
            match value["delta"]["stop_reason"].as_str() {
                Some(reason) => Ok(Some(ChatChunk::Done {
                    finish_reason: Some(reason.to_string()),
                })),
                None => Ok(None),
            }
        }
        "message_stop" => Ok(Some(ChatChunk::Done {
            finish_reason: None,
        })),
        "error" => {
            let value: Value = serde_json::from_str(data).unwrap_or(Value::Null);
            Err(LLMError::Stream(format!("provider stream error: {value}")))
        }
        // ping, message_start, content_block_start/stop carry no text
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::{Message, ModelCatalog};

    fn handler() -> AnthropicHandler {
        AnthropicHandler::new(&ProviderConfig {
            azure_endpoint: String::new(),
            azure_api_key: String::new(),
            openai_base: String::new(),
            openai_api_key: String::new(),
            anthropic_base: "http://anthropic.test/v1".into(),
            anthropic_api_key: "k".into(),
        })
    }

    fn request_with_system() -> ChatRequest {
        let model = ModelCatalog::builtin()
            .resolve("claude-sonnet")
            .unwrap()
            .clone();
        let mut request = ChatRequest::new(
            model,
            vec![Message::system("house rules"), Message::user("hi")],
        );
        request.system_prompt = Some("be brief".into());
        request
    }

    #[test]
    fn system_content_moves_to_top_level_parameter() {
        let handler = handler();
        let request = request_with_system();
        let body = handler.build_body(&request);

        let system = body["system"].as_str().unwrap();
        assert!(system.contains("be brief") && system.contains("house rules"));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn stream_events_normalize_to_chunks() {
        let delta = parse_anthropic_event(
            "content_block_delta",
            r#"{"delta":{"type":"text_delta","text":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(delta, Some(ChatChunk::Delta("hi".into())));

        let stop = parse_anthropic_event("message_stop", "{}").unwrap();
        assert!(matches!(stop, Some(ChatChunk::Done { .. })));

        let ping = parse_anthropic_event("ping", "{}").unwrap();
        assert_eq!(ping, None);

        assert!(parse_anthropic_event("error", r#"{"error":{}}"#).is_err());
    }
}
