//! The chat context: the single value threaded through every stage.
//!
//! Constructed once per inbound request from validated input, moved by
//! value through the stage chain, and discarded after the response is
//! returned. No cross-request state lives here; provider clients and
//! caches belong to the service container.

use std::collections::BTreeSet;
use std::pin::Pin;

use bytes::Bytes;
use chat_core::{ContentPart, Message, MessageContent, ModelDescriptor, Principal};
use futures::Stream;
use provider_llm::PendingTranscription;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::streaming::metadata::ResponseMetadata;

/// Requested search behavior.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Search disabled by the client
    Off,
    /// No preference expressed
    #[default]
    Auto,
    /// Classifier decides whether a web search is warranted
    Intelligent,
    /// Search always runs, classifier skipped
    Always,
}

/// Requested code-execution behavior.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CodeInterpreterMode {
    #[default]
    Off,
    /// Use code execution whenever compatible files are attached
    Always,
    /// Auxiliary classifier decides per request
    Intelligent,
}

/// Discriminator selecting the terminal execution handler.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    #[default]
    Standard,
    Agent,
    CodeInterpreter,
}

/// Response tone requested by the client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Tone {
    pub style: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A file marked as persistent context across turns.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ActiveFileRef {
    pub blob_id: String,
    pub name: String,
    /// Pre-computed size in tokens, used for budgeted selection
    pub token_estimate: u32,
}

/// Validated request data entering the pipeline. Conceptually immutable
/// once the context is built.
#[derive(Clone, Debug)]
pub struct ChatRequestInput {
    pub model: ModelDescriptor,
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub stream: bool,
    pub reasoning_effort: Option<String>,
    pub verbosity: Option<String>,
    /// Knowledge-base identifier enabling the RAG enricher
    pub bot_id: Option<String>,
    pub search_mode: SearchMode,
    pub agent_mode: bool,
    pub code_interpreter_mode: CodeInterpreterMode,
    /// Provider-side conversation continuation
    pub thread_id: Option<String>,
    pub tone: Option<Tone>,
    /// Delay between streamed chunks, in milliseconds
    pub streaming_speed_ms: Option<u64>,
    pub active_files: Vec<ActiveFileRef>,
}

/// Content-type flags derived once from the last message.
#[derive(Clone, Debug, Default)]
pub struct ContentFlags {
    pub has_files: bool,
    pub has_images: bool,
    pub has_audio: bool,
    pub content_types: BTreeSet<String>,
}

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "ogg", "flac", "webm"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub fn file_extension(name: &str) -> String {
    name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase()
}

pub fn is_audio(name: &str) -> bool {
    AUDIO_EXTENSIONS.contains(&file_extension(name).as_str())
}

pub fn is_video(name: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&file_extension(name).as_str())
}

pub fn is_image(name: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&file_extension(name).as_str())
}

impl ContentFlags {
    pub fn analyze(messages: &[Message]) -> Self {
        let mut flags = Self::default();
        let Some(last) = messages.last() else {
            return flags;
        };
        for part in last.content.parts() {
            match part {
                ContentPart::ImageUrl { .. } => {
                    flags.has_images = true;
                    flags.content_types.insert("image".to_string());
                }
                ContentPart::FileUrl { name, .. } => {
                    let name = name.clone().unwrap_or_default();
                    if is_audio(&name) || is_video(&name) {
                        flags.has_audio = true;
                        flags.content_types.insert("audio".to_string());
                    } else if is_image(&name) {
                        flags.has_images = true;
                        flags.content_types.insert("image".to_string());
                    } else {
                        flags.content_types.insert("file".to_string());
                    }
                    flags.has_files = true;
                }
                ContentPart::Text { .. } | ContentPart::Thinking { .. } => {}
            }
        }
        flags
    }
}

/// How an individual file ended up after processing.
#[derive(Clone, Debug, PartialEq)]
pub enum ProcessedFileKind {
    /// Extracted text attached verbatim
    Inline { text: String },
    /// Over-budget text replaced by a model-written summary
    Summary { text: String },
    Transcript,
    Image,
    Error { reason: String },
}

#[derive(Clone, Debug)]
pub struct ProcessedFile {
    pub blob_id: String,
    pub name: String,
    pub kind: ProcessedFileKind,
    /// Raw bytes kept for code-interpreter upload when compatible
    pub raw: Option<Bytes>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transcript {
    pub file_name: String,
    pub text: String,
    /// True when the text is a placeholder for a pending async job
    pub placeholder: bool,
}

/// Structured extraction output plus the open metadata side-channel.
#[derive(Clone, Debug, Default)]
pub struct ProcessedContent {
    pub files: Vec<ProcessedFile>,
    pub transcripts: Vec<Transcript>,
    pub pending_transcriptions: Vec<PendingTranscription>,
    /// Normalized image URLs (data URLs after inlining)
    pub images: Vec<String>,
    /// Open side-channel for citations, RAG config, failure flags.
    /// Producers must not clobber unrelated keys; use [`ProcessedContent::merge_metadata`].
    pub metadata: Map<String, Value>,
}

pub const META_CITATIONS: &str = "citations";
pub const META_KB_SYSTEM_PROMPT: &str = "kb_system_prompt";
pub const META_ACTIVE_FILE_BLOCK: &str = "active_file_block";
pub const META_UNSUPPORTED_IMAGES: &str = "unsupported_images";
pub const META_FILE_FAILURE: &str = "file_processing_failed";
pub const META_FILE_FAILURE_REASON: &str = "file_failure_reason";
pub const META_CODE_RECOMMENDED: &str = "code_interpreter_recommended";

impl ProcessedContent {
    /// Shallow-additive metadata merge: incoming keys win individually,
    /// unrelated existing keys are preserved.
    pub fn merge_metadata(&mut self, incoming: Map<String, Value>) {
        for (key, value) in incoming {
            self.metadata.insert(key, value);
        }
    }

    pub fn metadata_flag(&self, key: &str) -> bool {
        self.metadata.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// A recorded, sequential citation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Citation {
    pub number: usize,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Capabilities requested for agent execution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentCapabilities {
    pub bing_grounding: bool,
    pub code_interpreter: bool,
    /// Backend ids of files uploaded for this run
    pub uploaded_file_ids: Vec<String>,
}

/// A non-fatal failure recorded by a stage.
#[derive(Clone, Debug)]
pub struct StageFailure {
    pub stage: String,
    pub message: String,
}

/// Byte stream of response text chunks followed by the sentinel metadata
/// block.
pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, PipelineError>> + Send>>;

/// Terminal response artifact.
pub enum ChatResponse {
    Stream(ResponseStream),
    Text {
        text: String,
        metadata: ResponseMetadata,
    },
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("ChatResponse::Stream(..)"),
            Self::Text { text, .. } => f.debug_struct("ChatResponse::Text").field("text", text).finish(),
        }
    }
}

/// The pipeline's sole context value.
#[derive(Debug)]
pub struct ChatContext {
    pub user: Principal,
    pub request: ChatRequestInput,
    pub flags: ContentFlags,

    /// Effective search mode; enrichers may upgrade it per policy
    pub search_mode: SearchMode,
    pub processed_content: ProcessedContent,
    /// Once set, the source of truth for every later stage
    pub enriched_messages: Option<Vec<Message>>,
    pub execution_strategy: ExecutionStrategy,
    pub agent_capabilities: AgentCapabilities,
    pub response: Option<ChatResponse>,
    pub errors: Vec<StageFailure>,
    pub rate_limit: Option<String>,
    pub cancel: CancellationToken,
}

impl ChatContext {
    pub fn new(user: Principal, request: ChatRequestInput) -> Self {
        let flags = ContentFlags::analyze(&request.messages);
        let search_mode = request.search_mode;
        // Forced code execution outside agent mode takes the dedicated
        // code-interpreter path; agent-mode routing is the enrichers' call.
        let execution_strategy = if !request.agent_mode
            && request.code_interpreter_mode == CodeInterpreterMode::Always
            && (request.model.code_agent_id.is_some() || request.model.agent_id.is_some())
        {
            ExecutionStrategy::CodeInterpreter
        } else {
            ExecutionStrategy::default()
        };
        Self {
            user,
            request,
            flags,
            search_mode,
            processed_content: ProcessedContent::default(),
            enriched_messages: None,
            execution_strategy,
            agent_capabilities: AgentCapabilities::default(),
            response: None,
            errors: Vec::new(),
            rate_limit: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The message list every later stage must use: enriched messages
    /// once any enricher has produced them, the request messages before.
    pub fn effective_messages(&self) -> &[Message] {
        match &self.enriched_messages {
            Some(messages) => messages,
            None => &self.request.messages,
        }
    }

    /// Text of the last user message, ignoring internal parts.
    pub fn last_user_text(&self) -> String {
        self.effective_messages()
            .last()
            .map(Message::text)
            .unwrap_or_default()
    }

    /// Record a non-fatal failure and keep going.
    pub fn record_failure(&mut self, stage: &str, message: impl Into<String>) {
        let message = message.into();
        log::warn!("stage {stage} degraded: {message}");
        self.errors.push(StageFailure {
            stage: stage.to_string(),
            message,
        });
    }

    /// Citations recorded so far, in assigned order.
    pub fn citations(&self) -> Vec<Citation> {
        self.processed_content
            .metadata
            .get(META_CITATIONS)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Replace the recorded citation list.
    pub fn set_citations(&mut self, citations: &[Citation]) {
        self.processed_content.metadata.insert(
            META_CITATIONS.to_string(),
            serde_json::to_value(citations).unwrap_or(Value::Null),
        );
    }

    /// Replace the message list going downstream.
    pub fn set_enriched_messages(&mut self, messages: Vec<Message>) {
        self.enriched_messages = Some(messages);
    }

    /// Append a system message to the effective message list.
    pub fn push_system_message(&mut self, text: impl Into<String>) {
        let mut messages = self.effective_messages().to_vec();
        // Insert before the trailing user turn so the provider sees the
        // context ahead of the question.
        let insert_at = messages.len().saturating_sub(1);
        messages.insert(insert_at, Message::system(text));
        self.enriched_messages = Some(messages);
    }

    /// Append text to the last message's content.
    pub fn append_to_last_message(&mut self, text: &str) {
        let mut messages = self.effective_messages().to_vec();
        if let Some(last) = messages.last_mut() {
            match &mut last.content {
                MessageContent::Text(existing) => {
                    existing.push_str(text);
                }
                MessageContent::Parts(parts) => parts.push(ContentPart::text(text)),
            }
        }
        self.enriched_messages = Some(messages);
    }
}
