//! Provider handler strategy.
//!
//! One handler per request/response shape. Selection keys strictly off
//! the static flags on the model descriptor; runtime content never
//! influences which handler runs. All non-Anthropic handlers share one
//! request-execution code path ([`exec::execute_openai_style`]).

mod anthropic;
mod azure;
mod exec;
mod merge_system;
mod openai_compat;
mod wire;

pub use anthropic::AnthropicHandler;
pub use azure::AzureHandler;
pub use merge_system::MergeSystemPromptHandler;
pub use openai_compat::OpenAiCompatHandler;

use async_trait::async_trait;
use chat_core::{AppConfig, ModelDescriptor, ProviderSdk};
use serde_json::Value;

use crate::error::Result;
use crate::types::{ChatOutcome, ChatRequest};

/// Endpoint/key configuration for the concrete handlers.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub azure_endpoint: String,
    pub azure_api_key: String,
    pub openai_base: String,
    pub openai_api_key: String,
    pub anthropic_base: String,
    pub anthropic_api_key: String,
}

impl From<&AppConfig> for ProviderConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            azure_endpoint: config.azure_openai_endpoint.clone(),
            azure_api_key: config.azure_openai_api_key.clone(),
            openai_base: config.openai_compatible_base.clone(),
            openai_api_key: config.openai_compatible_api_key.clone(),
            anthropic_base: config.anthropic_base.clone(),
            anthropic_api_key: config.anthropic_api_key.clone(),
        }
    }
}

/// Per-provider message shaping, request building, and execution.
#[async_trait]
pub trait ProviderHandler: Send + Sync {
    /// Wire-shaped message array for this provider.
    fn shape_messages(&self, request: &ChatRequest) -> Vec<Value>;

    /// Full request body. Only parameters the target model supports are
    /// emitted (e.g. temperature is omitted for models that reject it).
    fn build_body(&self, request: &ChatRequest) -> Value;

    async fn execute(&self, request: &ChatRequest) -> Result<ChatOutcome>;
}

/// Select the handler for a model.
pub fn handler_for(model: &ModelDescriptor, config: &ProviderConfig) -> Box<dyn ProviderHandler> {
    match (model.sdk, model.avoid_system_prompt) {
        (ProviderSdk::Anthropic, _) => Box::new(AnthropicHandler::new(config)),
        (ProviderSdk::AzureOpenAi, _) => Box::new(AzureHandler::new(config)),
        (ProviderSdk::OpenAiCompatible, true) => Box::new(MergeSystemPromptHandler::new(config)),
        (ProviderSdk::OpenAiCompatible, false) => Box::new(OpenAiCompatHandler::new(config)),
    }
}
