use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider error: {0}")]
    Llm(#[from] provider_llm::LLMError),

    #[error("agent backend error: {0}")]
    Agent(#[from] agent_client::AgentError),

    #[error("storage error: {0}")]
    Store(#[from] blob_store::StoreError),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("{0}")]
    Internal(String),
}
