//! Standard OpenAI-compatible chat completions handler.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{LLMError, Result};
use crate::types::{ChatOutcome, ChatRequest};

use super::exec::execute_openai_style;
use super::wire::messages_to_wire;
use super::{ProviderConfig, ProviderHandler};

pub struct OpenAiCompatHandler {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatHandler {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.openai_base.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
        }
    }

    pub(super) fn client(&self) -> &Client {
        &self.client
    }

    pub(super) fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub(super) fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| LLMError::Auth(format!("invalid API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub(super) fn body_common(&self, request: &ChatRequest, messages: Vec<Value>) -> Value {
        let mut body = json!({
            "model": request.model.deployment,
            "messages": messages,
            "stream": request.stream,
            "max_tokens": request
                .max_output_tokens
                .unwrap_or(request.model.max_output_tokens),
        });

        if request.model.supports_temperature {
            if let Some(temperature) = request.temperature {
                body["temperature"] = json!(temperature);
            }
        }

        body
    }
}

#[async_trait]
impl ProviderHandler for OpenAiCompatHandler {
    fn shape_messages(&self, request: &ChatRequest) -> Vec<Value> {
        messages_to_wire(&request.messages, request.system_prompt.as_deref())
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        self.body_common(request, self.shape_messages(request))
    }

    async fn execute(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let body = self.build_body(request);
        execute_openai_style(
            &self.client,
            self.url(),
            self.headers()?,
            body,
            request.stream,
        )
        .await
    }
}
