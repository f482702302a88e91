//! Model catalog and per-model capability flags.
//!
//! Provider dispatch keys strictly off these static flags, never off
//! runtime content.

use serde::{Deserialize, Serialize};

/// Which request/response shape a model speaks.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSdk {
    /// Azure-native chat completions (reasoning effort / verbosity knobs)
    AzureOpenAi,
    /// Any OpenAI-compatible chat completions endpoint
    OpenAiCompatible,
    /// Anthropic Messages API (separate system parameter, different
    /// streaming event shape)
    Anthropic,
}

/// Static description of a deployable model.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelDescriptor {
    /// Public model id as sent by clients
    pub id: String,
    /// Provider-side deployment/model name
    pub deployment: String,
    pub sdk: ProviderSdk,
    /// Provider rejects system roles; merge the system prompt into the
    /// first user message instead
    #[serde(default)]
    pub avoid_system_prompt: bool,
    /// Model rejects the temperature parameter
    #[serde(default)]
    pub supports_temperature: bool,
    #[serde(default)]
    pub supports_vision: bool,
    /// Model accepts reasoning-effort / verbosity parameters
    #[serde(default)]
    pub supports_reasoning: bool,
    /// Context window in tokens, used to budget inline file content
    pub token_limit: u32,
    pub max_output_tokens: u32,
    /// Agent identifier for agent-mode execution, when configured
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Dedicated code-execution agent identifier; takes priority over
    /// `agent_id` for the code-interpreter execution path
    #[serde(default)]
    pub code_agent_id: Option<String>,
}

impl ModelDescriptor {
    pub fn supports_agent_mode(&self) -> bool {
        self.agent_id.is_some()
    }
}

/// In-process registry resolving inbound model ids.
#[derive(Clone, Debug, Default)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    pub fn resolve(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn all(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Built-in catalog used when no external model configuration is
    /// supplied.
    pub fn builtin() -> Self {
        Self::new(vec![
            ModelDescriptor {
                id: "gpt-4o".to_string(),
                deployment: "gpt-4o".to_string(),
                sdk: ProviderSdk::AzureOpenAi,
                avoid_system_prompt: false,
                supports_temperature: true,
                supports_vision: true,
                supports_reasoning: false,
                token_limit: 128_000,
                max_output_tokens: 16_384,
                agent_id: Some("agent-gpt4o".to_string()),
                code_agent_id: Some("agent-gpt4o-code".to_string()),
            },
            ModelDescriptor {
                id: "gpt-5".to_string(),
                deployment: "gpt-5".to_string(),
                sdk: ProviderSdk::AzureOpenAi,
                avoid_system_prompt: false,
                supports_temperature: false,
                supports_vision: true,
                supports_reasoning: true,
                token_limit: 272_000,
                max_output_tokens: 128_000,
                agent_id: Some("agent-gpt5".to_string()),
                code_agent_id: None,
            },
            ModelDescriptor {
                id: "deepseek-chat".to_string(),
                deployment: "deepseek-chat".to_string(),
                sdk: ProviderSdk::OpenAiCompatible,
                avoid_system_prompt: true,
                supports_temperature: true,
                supports_vision: false,
                supports_reasoning: false,
                token_limit: 64_000,
                max_output_tokens: 8_192,
                agent_id: None,
                code_agent_id: None,
            },
            ModelDescriptor {
                id: "claude-sonnet".to_string(),
                deployment: "claude-sonnet-4-20250514".to_string(),
                sdk: ProviderSdk::Anthropic,
                avoid_system_prompt: false,
                supports_temperature: true,
                supports_vision: true,
                supports_reasoning: false,
                token_limit: 200_000,
                max_output_tokens: 64_000,
                agent_id: None,
                code_agent_id: None,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_resolves_known_ids() {
        let catalog = ModelCatalog::builtin();
        assert!(catalog.resolve("gpt-4o").is_some());
        assert!(catalog.resolve("nope").is_none());
    }

    #[test]
    fn agent_mode_requires_agent_id() {
        let catalog = ModelCatalog::builtin();
        assert!(catalog.resolve("gpt-4o").unwrap().supports_agent_mode());
        assert!(!catalog
            .resolve("deepseek-chat")
            .unwrap()
            .supports_agent_mode());
    }
}
