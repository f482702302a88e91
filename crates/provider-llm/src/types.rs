//! Normalized request/response types shared by all provider handlers.

use std::pin::Pin;

use chat_core::{Message, ModelDescriptor};
use futures::Stream;

use crate::error::Result;

/// One normalized increment of a streamed completion.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatChunk {
    /// Incremental text delta
    Delta(String),
    /// Terminal event; carries the provider finish reason when known
    Done { finish_reason: Option<String> },
}

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// Result of a provider call: a full completion or an incremental stream,
/// depending on the request's stream flag.
pub enum ChatOutcome {
    Completion(String),
    Stream(LLMStream),
}

impl std::fmt::Debug for ChatOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatOutcome::Completion(text) => f.debug_tuple("Completion").field(text).finish(),
            ChatOutcome::Stream(_) => f.debug_tuple("Stream").finish(),
        }
    }
}

/// A fully assembled provider request.
///
/// Messages here are final: internal-only content parts have already been
/// stripped by the terminal handler.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub model: ModelDescriptor,
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub stream: bool,
    pub reasoning_effort: Option<String>,
    pub verbosity: Option<String>,
    pub max_output_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: ModelDescriptor, messages: Vec<Message>) -> Self {
        Self {
            model,
            messages,
            system_prompt: None,
            temperature: None,
            stream: false,
            reasoning_effort: None,
            verbosity: None,
            max_output_tokens: None,
        }
    }
}
