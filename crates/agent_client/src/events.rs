//! Normalized agent run events.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AgentError, Result};

/// Citation annotation attached to a message delta: maps a provider
/// marker string to its source.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CitationAnnotation {
    pub marker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileOutputKind {
    Image,
    File,
}

/// One event from an agent run stream.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentEvent {
    /// Emitted when the backend created a new thread for this run
    ThreadCreated { thread_id: String },
    /// Incremental assistant text, possibly containing citation markers
    MessageDelta {
        text: String,
        annotations: Vec<CitationAnnotation>,
    },
    /// Code-interpreter input delta
    CodeInput { code: String },
    /// Code-interpreter execution logs
    CodeLogs { logs: String },
    /// Generated file reference
    FileOutput {
        file_id: String,
        kind: FileOutputKind,
    },
    Completed,
    Failed { message: String },
}

pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send>>;

/// Decode one SSE event from the run stream.
///
/// Unknown event names are skipped so backend additions do not break
/// older clients.
pub fn parse_event(event: &str, data: &str) -> Result<Option<AgentEvent>> {
    match event {
        "thread.created" => {
            let value: Value = serde_json::from_str(data)?;
            let thread_id = value["thread_id"]
                .as_str()
                .ok_or_else(|| AgentError::Stream("thread.created missing thread_id".into()))?
                .to_string();
            Ok(Some(AgentEvent::ThreadCreated { thread_id }))
        }
        "message.delta" => {
            #[derive(Deserialize)]
            struct Delta {
                #[serde(default)]
                text: String,
                #[serde(default)]
                annotations: Vec<CitationAnnotation>,
            }
            let delta: Delta = serde_json::from_str(data)?;
            Ok(Some(AgentEvent::MessageDelta {
                text: delta.text,
                annotations: delta.annotations,
            }))
        }
        "code.input" => {
            let value: Value = serde_json::from_str(data)?;
            Ok(Some(AgentEvent::CodeInput {
                code: value["code"].as_str().unwrap_or_default().to_string(),
            }))
        }
        "code.logs" => {
            let value: Value = serde_json::from_str(data)?;
            Ok(Some(AgentEvent::CodeLogs {
                logs: value["logs"].as_str().unwrap_or_default().to_string(),
            }))
        }
        "file.output" => {
            #[derive(Deserialize)]
            struct FileOutput {
                file_id: String,
                kind: FileOutputKind,
            }
            let output: FileOutput = serde_json::from_str(data)?;
            Ok(Some(AgentEvent::FileOutput {
                file_id: output.file_id,
                kind: output.kind,
            }))
        }
        "run.completed" => Ok(Some(AgentEvent::Completed)),
        "run.failed" => {
            let value: Value = serde_json::from_str(data).unwrap_or(Value::Null);
            Ok(Some(AgentEvent::Failed {
                message: value["error"].as_str().unwrap_or("run failed").to_string(),
            }))
        }
        _ => Ok(None),
    }
}
