//! Message-to-wire conversion shared by the OpenAI-style handlers.

use chat_core::{ContentPart, Message, MessageContent, Role};
use serde_json::{json, Value};

pub fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Convert message content to the chat-completions wire shape: a plain
/// string, or an array of text/image_url parts.
///
/// `FileUrl` parts are internal-only and must already have been stripped
/// by the terminal handler; any stragglers are dropped here rather than
/// leaked to the provider. `Thinking` parts are never sent back.
pub fn content_to_wire(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Parts(parts) => {
            let wire: Vec<Value> = parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentPart::ImageUrl { image_url } => Some(json!({
                        "type": "image_url",
                        "image_url": { "url": image_url.url },
                    })),
                    ContentPart::FileUrl { .. } | ContentPart::Thinking { .. } => None,
                })
                .collect();
            json!(wire)
        }
    }
}

/// Shape messages for a provider that accepts system roles.
pub fn messages_to_wire(messages: &[Message], system_prompt: Option<&str>) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system_prompt {
        out.push(json!({ "role": "system", "content": system }));
    }
    for message in messages {
        out.push(json!({
            "role": role_str(message.role),
            "content": content_to_wire(&message.content),
        }));
    }
    out
}

/// Shape messages for a provider that rejects system roles: the system
/// prompt is merged into the first user message instead.
pub fn messages_to_wire_merged(messages: &[Message], system_prompt: Option<&str>) -> Vec<Value> {
    let mut pending_system: Option<String> = system_prompt.map(str::to_string);
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::System => {
                let text = message.text();
                pending_system = Some(match pending_system.take() {
                    Some(existing) => format!("{existing}\n\n{text}"),
                    None => text,
                });
            }
            Role::User if pending_system.is_some() => {
                let system = pending_system.take().unwrap();
                let merged = format!("{system}\n\n{}", message.text());
                out.push(json!({ "role": "user", "content": merged }));
            }
            _ => out.push(json!({
                "role": role_str(message.role),
                "content": content_to_wire(&message.content),
            })),
        }
    }

    // No user message to merge into: send the instructions as a user turn.
    if let Some(system) = pending_system {
        out.insert(0, json!({ "role": "user", "content": system }));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_parts_never_reach_the_wire() {
        let content = MessageContent::Parts(vec![
            ContentPart::text("look"),
            ContentPart::FileUrl {
                url: "u/uploads/files/b".into(),
                name: None,
            },
        ]);
        let wire = content_to_wire(&content);
        let parts = wire.as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["type"], "text");
    }

    #[test]
    fn merged_shaping_folds_system_into_first_user_turn() {
        let messages = vec![Message::user("question")];
        let wire = messages_to_wire_merged(&messages, Some("instructions"));
        assert_eq!(wire.len(), 1);
        let text = wire[0]["content"].as_str().unwrap();
        assert!(text.starts_with("instructions"));
        assert!(text.ends_with("question"));
    }

    #[test]
    fn merged_shaping_handles_system_only_input() {
        let wire = messages_to_wire_merged(&[], Some("instructions"));
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "user");
    }
}
