//! Typed message content.
//!
//! A message body is either a plain string or an ordered list of typed
//! parts. `FileUrl` parts are an internal-only marker: they carry blob
//! references through the pipeline and must be stripped before any
//! provider call.

use serde::{Deserialize, Serialize};

/// Placeholder substituted when stripping internal parts would leave a
/// message with no content at all.
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "(attachment)";

/// A part of message content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text { text: String },

    /// Image reference (https or data URL)
    ImageUrl { image_url: ImageSource },

    /// Internal file reference, never sent to a provider
    FileUrl {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Model thinking/reasoning content
    Thinking { thinking: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageSource { url: url.into() },
        }
    }

    /// Get text content if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Image source wrapper matching the wire shape `{"url": "..."}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageSource {
    pub url: String,
}

/// Message content: a plain string or an ordered list of typed parts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// All text parts concatenated (plain string content returned as-is).
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| p.as_text())
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn parts(&self) -> &[ContentPart] {
        match self {
            Self::Text(_) => &[],
            Self::Parts(parts) => parts,
        }
    }

    pub fn has_images(&self) -> bool {
        self.parts()
            .iter()
            .any(|p| matches!(p, ContentPart::ImageUrl { .. }))
    }

    pub fn has_file_refs(&self) -> bool {
        self.parts()
            .iter()
            .any(|p| matches!(p, ContentPart::FileUrl { .. }))
    }

    /// Remove internal-only `FileUrl` parts.
    ///
    /// If stripping leaves no parts at all, a text placeholder is
    /// substituted so providers never receive an empty content array.
    pub fn without_file_refs(&self) -> MessageContent {
        match self {
            Self::Text(text) => Self::Text(text.clone()),
            Self::Parts(parts) => {
                let kept: Vec<ContentPart> = parts
                    .iter()
                    .filter(|p| !matches!(p, ContentPart::FileUrl { .. }))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    Self::Text(EMPTY_CONTENT_PLACEHOLDER.to_string())
                } else {
                    Self::Parts(kept)
                }
            }
        }
    }

    /// Append a text part, merging plain-string content into parts form.
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self {
            Self::Text(existing) => {
                existing.push_str(&text);
            }
            Self::Parts(parts) => parts.push(ContentPart::text(text)),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_file_refs_strips_internal_parts() {
        let content = MessageContent::Parts(vec![
            ContentPart::text("see attached"),
            ContentPart::FileUrl {
                url: "u/uploads/files/b1".into(),
                name: None,
            },
        ]);
        let stripped = content.without_file_refs();
        assert_eq!(stripped.parts().len(), 1);
        assert!(!stripped.has_file_refs());
    }

    #[test]
    fn without_file_refs_substitutes_placeholder_when_emptied() {
        let content = MessageContent::Parts(vec![ContentPart::FileUrl {
            url: "u/uploads/files/b1".into(),
            name: None,
        }]);
        let stripped = content.without_file_refs();
        assert_eq!(stripped.as_text(), EMPTY_CONTENT_PLACEHOLDER);
    }

    #[test]
    fn content_deserializes_from_plain_string_and_array() {
        let plain: MessageContent = serde_json::from_str("\"hi\"").unwrap();
        assert_eq!(plain.as_text(), "hi");

        let parts: MessageContent =
            serde_json::from_str(r#"[{"type":"text","text":"hi"}]"#).unwrap();
        assert_eq!(parts.parts().len(), 1);
    }
}
