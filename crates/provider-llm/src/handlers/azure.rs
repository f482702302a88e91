//! Azure-native chat completions handler.
//!
//! Speaks the deployment-scoped Azure endpoint and is the only handler
//! that forwards reasoning-effort / verbosity parameters.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{LLMError, Result};
use crate::types::{ChatOutcome, ChatRequest};

use super::exec::execute_openai_style;
use super::wire::messages_to_wire;
use super::{ProviderConfig, ProviderHandler};

const API_VERSION: &str = "2024-10-21";

pub struct AzureHandler {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl AzureHandler {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.azure_endpoint.trim_end_matches('/').to_string(),
            api_key: config.azure_api_key.clone(),
        }
    }

    fn url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, deployment, API_VERSION
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| LLMError::Auth(format!("invalid API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl ProviderHandler for AzureHandler {
    fn shape_messages(&self, request: &ChatRequest) -> Vec<Value> {
        messages_to_wire(&request.messages, request.system_prompt.as_deref())
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "messages": self.shape_messages(request),
            "stream": request.stream,
        });

        if request.model.supports_temperature {
            if let Some(temperature) = request.temperature {
                body["temperature"] = json!(temperature);
            }
        }

        // Reasoning models take max_completion_tokens and the effort knobs.
        let max_tokens = request
            .max_output_tokens
            .unwrap_or(request.model.max_output_tokens);
        if request.model.supports_reasoning {
            body["max_completion_tokens"] = json!(max_tokens);
            if let Some(effort) = &request.reasoning_effort {
                body["reasoning_effort"] = json!(effort);
            }
            if let Some(verbosity) = &request.verbosity {
                body["verbosity"] = json!(verbosity);
            }
        } else {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    async fn execute(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let body = self.build_body(request);
        execute_openai_style(
            &self.client,
            self.url(&request.model.deployment),
            self.headers()?,
            body,
            request.stream,
        )
        .await
    }
}
