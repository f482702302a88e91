//! Handler for providers that reject system roles.
//!
//! Identical to the OpenAI-compatible handler except the system prompt
//! (and any system-role history) is folded into the first user message.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{ChatOutcome, ChatRequest};

use super::exec::execute_openai_style;
use super::wire::messages_to_wire_merged;
use super::{OpenAiCompatHandler, ProviderConfig, ProviderHandler};

pub struct MergeSystemPromptHandler {
    inner: OpenAiCompatHandler,
}

impl MergeSystemPromptHandler {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            inner: OpenAiCompatHandler::new(config),
        }
    }
}

#[async_trait]
impl ProviderHandler for MergeSystemPromptHandler {
    fn shape_messages(&self, request: &ChatRequest) -> Vec<Value> {
        messages_to_wire_merged(&request.messages, request.system_prompt.as_deref())
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        self.inner.body_common(request, self.shape_messages(request))
    }

    async fn execute(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let body = self.build_body(request);
        execute_openai_style(
            self.inner.client(),
            self.inner.url(),
            self.inner.headers()?,
            body,
            request.stream,
        )
        .await
    }
}
