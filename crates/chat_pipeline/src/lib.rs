//! Stage-based chat request pipeline.
//!
//! A validated request becomes a [`ChatContext`] that is moved through a
//! fixed sequence of stages: content processors populate extracted
//! content, feature enrichers add optional capabilities, and exactly one
//! execution handler produces the response. Stages degrade gracefully on
//! expected failures; only unrecoverable conditions abort the request.

pub mod capability;
pub mod context;
pub mod enrichers;
pub mod error;
pub mod handlers;
pub mod processors;
pub mod rag;
pub mod services;
pub mod stage;
pub mod streaming;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{
    ChatContext, ChatRequestInput, ChatResponse, Citation, CodeInterpreterMode,
    ExecutionStrategy, SearchMode,
};
pub use error::PipelineError;
pub use services::ServiceContainer;
pub use stage::{default_pipeline, Pipeline, Stage};
