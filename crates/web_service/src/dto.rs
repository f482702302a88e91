//! Inbound request schema and validation.
//!
//! Validation happens before any pipeline stage runs; a malformed,
//! oversized, or unknown-field request is always fatal and never retried.

use chat_core::{Message, ModelCatalog};
use chat_pipeline::context::{ActiveFileRef, Tone};
use chat_pipeline::{ChatRequestInput, CodeInterpreterMode, SearchMode};
use serde::Deserialize;

use crate::error::AppError;

const MAX_MESSAGES: usize = 100;
const MAX_TEXT_CHARS: usize = 100_000;
const MAX_CONTENT_PARTS: usize = 50;
const MAX_ACTIVE_FILES: usize = 20;

const EFFORT_VALUES: &[&str] = &["low", "medium", "high"];
const VERBOSITY_VALUES: &[&str] = &["low", "medium", "high"];

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ActiveFileDto {
    pub blob_id: String,
    pub name: String,
    #[serde(default)]
    pub token_estimate: u32,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ToneDto {
    pub style: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// The wire request. Unknown top-level fields are rejected.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ChatRequestDto {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub verbosity: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub search_mode: SearchMode,
    #[serde(default)]
    pub agent_mode: bool,
    #[serde(default)]
    pub code_interpreter_mode: CodeInterpreterMode,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub tone: Option<ToneDto>,
    #[serde(default)]
    pub streaming_speed_ms: Option<u64>,
    #[serde(default)]
    pub active_files: Vec<ActiveFileDto>,
}

impl ChatRequestDto {
    /// Bounds-check the request and resolve the model descriptor.
    pub fn validate(self, catalog: &ModelCatalog) -> Result<ChatRequestInput, AppError> {
        let model = catalog
            .resolve(&self.model)
            .ok_or_else(|| AppError::UnknownModel(self.model.clone()))?
            .clone();

        if self.messages.is_empty() || self.messages.len() > MAX_MESSAGES {
            return Err(AppError::Validation(format!(
                "messages must contain between 1 and {MAX_MESSAGES} entries"
            )));
        }
        for (i, message) in self.messages.iter().enumerate() {
            let parts = message.content.parts();
            if parts.len() > MAX_CONTENT_PARTS {
                return Err(AppError::Validation(format!(
                    "message {i} has more than {MAX_CONTENT_PARTS} content parts"
                )));
            }
            if message.text().chars().count() > MAX_TEXT_CHARS {
                return Err(AppError::Validation(format!(
                    "message {i} exceeds {MAX_TEXT_CHARS} characters"
                )));
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(AppError::Validation(
                    "temperature must be between 0 and 2".into(),
                ));
            }
        }
        if let Some(effort) = &self.reasoning_effort {
            if !EFFORT_VALUES.contains(&effort.as_str()) {
                return Err(AppError::Validation(format!(
                    "reasoning_effort must be one of {EFFORT_VALUES:?}"
                )));
            }
        }
        if let Some(verbosity) = &self.verbosity {
            if !VERBOSITY_VALUES.contains(&verbosity.as_str()) {
                return Err(AppError::Validation(format!(
                    "verbosity must be one of {VERBOSITY_VALUES:?}"
                )));
            }
        }
        if self.active_files.len() > MAX_ACTIVE_FILES {
            return Err(AppError::Validation(format!(
                "at most {MAX_ACTIVE_FILES} active files are allowed"
            )));
        }

        Ok(ChatRequestInput {
            model,
            messages: self.messages,
            system_prompt: self.system_prompt,
            temperature: self.temperature,
            stream: self.stream,
            reasoning_effort: self.reasoning_effort,
            verbosity: self.verbosity,
            bot_id: self.bot_id,
            search_mode: self.search_mode,
            agent_mode: self.agent_mode,
            code_interpreter_mode: self.code_interpreter_mode,
            thread_id: self.thread_id,
            tone: self.tone.map(|t| Tone {
                style: t.style,
                description: t.description,
            }),
            streaming_speed_ms: self.streaming_speed_ms,
            active_files: self
                .active_files
                .into_iter()
                .map(|f| ActiveFileRef {
                    blob_id: f.blob_id,
                    name: f.name,
                    token_estimate: f.token_estimate,
                })
                .collect(),
        })
    }
}
