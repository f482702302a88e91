//! Trailing structured metadata appended to the response stream.
//!
//! The client splits the output on the fixed sentinel pair: text before
//! the start sentinel is message content, the JSON between the sentinels
//! is structured metadata.

use provider_llm::PendingTranscription;
use serde::{Deserialize, Serialize};

use crate::context::Citation;

pub const METADATA_START: &str = "<<<METADATA_START>>>";
pub const METADATA_END: &str = "<<<METADATA_END>>>";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TranscriptInfo {
    pub file_name: String,
    /// True when the transcript text is a placeholder for a pending job
    pub pending: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GeneratedFile {
    pub file_id: String,
    pub kind: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CodeInterpreterMeta {
    pub files: Vec<GeneratedFile>,
}

/// The structured tail of a response.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ResponseMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    /// Present only when the thread was created during this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcripts: Vec<TranscriptInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_transcriptions: Vec<PendingTranscription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_interpreter: Option<CodeInterpreterMeta>,
}

impl ResponseMetadata {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
            && self.thread_id.is_none()
            && self.transcripts.is_empty()
            && self.pending_transcriptions.is_empty()
            && self.code_interpreter.is_none()
    }

    /// Sentinel-delimited block, or `None` when there is nothing to emit.
    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let json = serde_json::to_string(self).ok()?;
        Some(format!("\n\n{METADATA_START}{json}{METADATA_END}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metadata_renders_nothing() {
        assert_eq!(ResponseMetadata::default().render(), None);
    }

    #[test]
    fn rendered_block_is_parseable_between_sentinels() {
        let metadata = ResponseMetadata {
            citations: vec![Citation {
                number: 1,
                title: "Doc".into(),
                url: "https://x".into(),
                date: None,
            }],
            thread_id: Some("th_1".into()),
            ..Default::default()
        };

        let block = metadata.render().unwrap();
        assert!(block.starts_with("\n\n<<<METADATA_START>>>"));
        assert!(block.ends_with("<<<METADATA_END>>>"));

        let inner = block
            .trim_start_matches("\n\n")
            .strip_prefix(METADATA_START)
            .unwrap()
            .strip_suffix(METADATA_END)
            .unwrap();
        let parsed: ResponseMetadata = serde_json::from_str(inner).unwrap();
        assert_eq!(parsed, metadata);
    }
}
