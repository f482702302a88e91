//! Message module - chat message and content types
//!
//! Shared message types used across the pipeline and providers.

mod content;

pub use content::{ContentPart, ImageSource, MessageContent};

use serde::{Deserialize, Serialize};

/// Role of a chat message author.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
///
/// Content is either a plain string or an ordered list of typed parts;
/// see [`MessageContent`].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// All text content of the message, parts concatenated.
    pub fn text(&self) -> String {
        self.content.as_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_concatenates_parts() {
        let msg = Message {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::text("hello "),
                ContentPart::FileUrl {
                    url: "user/uploads/files/abc".into(),
                    name: Some("notes.pdf".into()),
                },
                ContentPart::text("world"),
            ]),
        };
        assert_eq!(msg.text(), "hello world");
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
