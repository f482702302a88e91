//! Application configuration.
//!
//! Loaded once at process start from environment variables, with defaults
//! suitable for local development. The config value is immutable after
//! construction and shared by reference through the service container.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Precedence of the agent enricher's multimodal fallback versus an
/// explicitly requested search mode of "off".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentFallbackPolicy {
    /// An explicit "off" from the client is never silently upgraded.
    #[default]
    RespectExplicitOff,
    /// The fallback always switches search mode to intelligent.
    AlwaysUpgrade,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat completions endpoint base (Azure-style)
    pub azure_openai_endpoint: String,
    pub azure_openai_api_key: String,
    /// Base URL for OpenAI-compatible models (DeepSeek etc.)
    pub openai_compatible_base: String,
    pub openai_compatible_api_key: String,
    pub anthropic_base: String,
    pub anthropic_api_key: String,
    /// Agent execution backend (threads/runs/files)
    pub agent_endpoint: String,
    pub agent_api_key: String,
    /// Hybrid search endpoint
    pub search_endpoint: String,
    pub search_api_key: String,
    pub search_index: String,
    /// Blob storage endpoint
    pub blob_endpoint: String,
    pub blob_api_key: String,
    /// Transcription endpoint (sync + async jobs)
    pub transcription_endpoint: String,
    pub transcription_api_key: String,

    /// Fast auxiliary model used for routing and query reformulation
    pub aux_model: String,
    /// Summarization model for over-budget file content
    pub summary_model: String,
    /// Set false to skip query reformulation entirely
    pub reformulation_enabled: bool,

    /// Hard ceiling on a single attached file, in bytes
    pub max_file_bytes: u64,
    /// Audio at or under this size is transcribed synchronously
    pub audio_sync_threshold_bytes: u64,
    /// Root directory for per-request temp files
    pub temp_root: PathBuf,
    /// Estimated characters per token for inline-vs-summary budgeting
    pub chars_per_token: f32,
    /// Fraction of the model context window available to inline file text
    pub inline_budget_ratio: f32,
    /// Token budget for the active-file system prompt block
    pub active_file_token_budget: u32,

    pub agent_fallback_policy: AgentFallbackPolicy,

    pub bind_addr: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            azure_openai_endpoint: env_or("AZURE_OPENAI_ENDPOINT", "http://localhost:9001"),
            azure_openai_api_key: env_or("AZURE_OPENAI_API_KEY", ""),
            openai_compatible_base: env_or("OPENAI_COMPATIBLE_BASE", "http://localhost:9002/v1"),
            openai_compatible_api_key: env_or("OPENAI_COMPATIBLE_API_KEY", ""),
            anthropic_base: env_or("ANTHROPIC_BASE", "https://api.anthropic.com/v1"),
            anthropic_api_key: env_or("ANTHROPIC_API_KEY", ""),
            agent_endpoint: env_or("AGENT_ENDPOINT", "http://localhost:9003"),
            agent_api_key: env_or("AGENT_API_KEY", ""),
            search_endpoint: env_or("SEARCH_ENDPOINT", "http://localhost:9004"),
            search_api_key: env_or("SEARCH_API_KEY", ""),
            search_index: env_or("SEARCH_INDEX", "knowledge-base"),
            blob_endpoint: env_or("BLOB_ENDPOINT", "http://localhost:9005"),
            blob_api_key: env_or("BLOB_API_KEY", ""),
            transcription_endpoint: env_or("TRANSCRIPTION_ENDPOINT", "http://localhost:9006"),
            transcription_api_key: env_or("TRANSCRIPTION_API_KEY", ""),
            aux_model: env_or("AUX_MODEL", "gpt-4o-mini"),
            summary_model: env_or("SUMMARY_MODEL", "gpt-4o-mini"),
            reformulation_enabled: env_parse("REFORMULATION_ENABLED", true),
            max_file_bytes: env_parse("MAX_FILE_BYTES", 100 * 1024 * 1024),
            audio_sync_threshold_bytes: env_parse("AUDIO_SYNC_THRESHOLD_BYTES", 25 * 1024 * 1024),
            temp_root: PathBuf::from(env_or("TEMP_ROOT", "/tmp/chat-uploads")),
            chars_per_token: env_parse("CHARS_PER_TOKEN", 3.5),
            inline_budget_ratio: env_parse("INLINE_BUDGET_RATIO", 0.25),
            active_file_token_budget: env_parse("ACTIVE_FILE_TOKEN_BUDGET", 8_000),
            agent_fallback_policy: AgentFallbackPolicy::default(),
            bind_addr: env_or("BIND_ADDR", "127.0.0.1"),
            port: env_parse("PORT", 8080),
        }
    }

    /// Character budget below which extracted file text is inlined
    /// verbatim; above it the text is summarized instead.
    pub fn inline_char_budget(&self, token_limit: u32) -> usize {
        (token_limit as f32 * self.inline_budget_ratio * self.chars_per_token) as usize
    }
}
