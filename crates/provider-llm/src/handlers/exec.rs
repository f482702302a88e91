//! Shared request execution for the OpenAI-style handlers.
//!
//! Azure, OpenAI-compatible, and system-prompt-merging handlers differ
//! only in URL, headers, and message shaping; the POST / error mapping /
//! stream normalization below is one code path for all of them.

use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;

use crate::error::{LLMError, Result};
use crate::sse::llm_stream_from_sse;
use crate::types::{ChatChunk, ChatOutcome};

pub async fn execute_openai_style(
    client: &Client,
    url: String,
    headers: HeaderMap,
    body: Value,
    stream: bool,
) -> Result<ChatOutcome> {
    let response = client
        .post(&url)
        .headers(headers)
        .json(&body)
        .send()
        .await
        .map_err(LLMError::Http)?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.map_err(LLMError::Http)?;
        log::warn!("provider call to {url} failed: HTTP {status}");
        if status == 401 || status == 403 {
            return Err(LLMError::Auth(format!(
                "provider authentication failed: {text}"
            )));
        }
        return Err(LLMError::Api(format!("HTTP {status}: {text}")));
    }

    if stream {
        let stream = llm_stream_from_sse(response, |_event, data| parse_chunk(data));
        Ok(ChatOutcome::Stream(stream))
    } else {
        let value: Value = response.json().await.map_err(LLMError::Http)?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LLMError::Api(format!("completion missing content: {value}")))?;
        Ok(ChatOutcome::Completion(content.to_string()))
    }
}

/// Parse one chat-completions SSE data payload into a normalized chunk.
fn parse_chunk(data: &str) -> Result<Option<ChatChunk>> {
    if data.trim() == "[DONE]" {
        return Ok(Some(ChatChunk::Done {
            finish_reason: None,
        }));
    }

    let value: Value = serde_json::from_str(data)?;
    let choice = &value["choices"][0];

    if let Some(reason) = choice["finish_reason"].as_str() {
        return Ok(Some(ChatChunk::Done {
            finish_reason: Some(reason.to_string()),
        }));
    }

    match choice["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => {
            Ok(Some(ChatChunk::Delta(content.to_string())))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chunk_handles_delta_done_and_empty() {
        let delta = parse_chunk(r#"{"choices":[{"delta":{"content":"hi"}}]}"#).unwrap();
        assert_eq!(delta, Some(ChatChunk::Delta("hi".into())));

        let done = parse_chunk("[DONE]").unwrap();
        assert!(matches!(done, Some(ChatChunk::Done { .. })));

        let finish =
            parse_chunk(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(
            finish,
            Some(ChatChunk::Done {
                finish_reason: Some("stop".into())
            })
        );

        let empty = parse_chunk(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(empty, None);
    }
}
