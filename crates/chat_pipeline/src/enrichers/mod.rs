//! Feature enrichers.
//!
//! Run in a fixed priority order: code-interpreter routing first (the
//! agent enricher consumes its recommendation), then RAG (knowledge-base
//! context must exist before generic web-search routing evaluates what is
//! still missing), then the tool router, and the agent enricher last
//! because it can override the execution strategy chosen by everything
//! before it.

mod agent;
mod code_router;
mod rag;
mod tool_router;

pub use agent::AgentEnricher;
pub use code_router::CodeInterpreterRouterEnricher;
pub use rag::RagEnricher;
pub use tool_router::ToolRouterEnricher;
