//! Auxiliary model calls.
//!
//! Fast, non-streaming structured-JSON completions used for routing
//! decisions and query reformulation. The response contract is strict
//! JSON matching the caller's declared shape; callers deserialize into
//! their own decision types.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{LLMError, Result};

/// Contract for auxiliary completions.
#[async_trait]
pub trait AuxModel: Send + Sync {
    /// Run a non-streaming completion constrained to a JSON object
    /// response and return the parsed object.
    async fn structured(&self, system: &str, user: &str) -> Result<Value>;

    /// Run a plain non-streaming text completion (summarization).
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// OpenAI-compatible implementation using `response_format: json_object`.
pub struct HttpAuxModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpAuxModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

impl HttpAuxModel {
    async fn call(&self, body: Value) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(LLMError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.map_err(LLMError::Http)?;
            return Err(LLMError::Api(format!("aux model HTTP {status}: {text}")));
        }

        let value: Value = response.json().await.map_err(LLMError::Http)?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LLMError::Api("aux completion missing content".to_string()))
    }
}

#[async_trait]
impl AuxModel for HttpAuxModel {
    async fn structured(&self, system: &str, user: &str) -> Result<Value> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0,
        });
        let content = self.call(body).await?;
        serde_json::from_str(&content).map_err(LLMError::Json)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0.2,
        });
        self.call(body).await
    }
}
