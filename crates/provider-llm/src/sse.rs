//! Shared SSE -> [`LLMStream`] adapter.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Response;

use crate::error::{LLMError, Result};
use crate::types::{ChatChunk, LLMStream};

fn to_stream_error(err: LLMError) -> LLMError {
    match err {
        LLMError::Stream(msg) => LLMError::Stream(msg),
        other => LLMError::Stream(other.to_string()),
    }
}

/// Convert an SSE HTTP [`Response`] into an [`LLMStream`].
///
/// `handler` receives the SSE event name and data payload for each event,
/// and can either:
/// - return `Ok(Some(chunk))` to emit a chunk
/// - return `Ok(None)` to skip an event
/// - return `Err(_)` to emit a stream error (mapped to `LLMError::Stream`)
pub fn llm_stream_from_sse<H>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str, &str) -> Result<Option<ChatChunk>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(move |event| {
            let event = event.map_err(|e| LLMError::Stream(e.to_string()))?;
            handler(event.event.as_str(), event.data.as_str()).map_err(to_stream_error)
        })
        .filter_map(|result| async move {
            match result {
                Ok(Some(chunk)) => Some(Ok(chunk)),
                Ok(None) => None,
                Err(err) => Some(Err(err)),
            }
        });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sse_adapter_filters_none_and_maps_errors() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: keep\n\n",
            "data: skip\n\n",
            "data: boom\n\n",
        );
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/sse", server.uri()))
            .send()
            .await
            .expect("response");

        let mut stream = llm_stream_from_sse(response, |_event, data| match data {
            "skip" => Ok(None),
            "boom" => Err(LLMError::Api("boom".into())),
            other => Ok(Some(ChatChunk::Delta(other.to_string()))),
        });

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, ChatChunk::Delta("keep".into()));
        let second = stream.next().await.unwrap();
        assert!(matches!(second, Err(LLMError::Stream(_))));
    }
}
