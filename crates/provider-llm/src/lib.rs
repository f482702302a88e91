//! Per-provider request shaping and streaming chat completion clients.
//!
//! The handler factory selects a request/response shape strictly from the
//! static flags on [`chat_core::ModelDescriptor`]; downstream stream
//! processing is provider-agnostic because every handler normalizes its
//! provider's events into the same [`types::ChatChunk`] shape.

pub mod aux;
pub mod error;
pub mod handlers;
pub mod sse;
pub mod transcription;
pub mod types;

pub use aux::{AuxModel, HttpAuxModel};
pub use error::{LLMError, Result};
pub use handlers::{handler_for, ProviderConfig, ProviderHandler};
pub use transcription::{HttpTranscriber, PendingTranscription, Transcriber};
pub use types::{ChatChunk, ChatOutcome, ChatRequest, LLMStream};
