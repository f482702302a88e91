//! Agent execution backend client.
//!
//! The pipeline depends on the [`AgentBackend`] trait; the HTTP client
//! here speaks a threads/runs/files REST shape with an SSE run stream.
//! Runs are not awaited to completion server-side: `stream_run` returns
//! the event sequence as soon as the stream is open.

pub mod events;

use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

pub use events::{AgentEvent, AgentEventStream, CitationAnnotation, FileOutputKind};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Capability flags and uploaded files for a run.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RunCapabilities {
    pub bing_grounding: bool,
    pub code_interpreter: bool,
    /// Backend file ids uploaded for code-interpreter runs
    #[serde(default)]
    pub file_ids: Vec<String>,
}

/// Agent backend contract consumed by the execution handlers.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Create a provider-side conversation thread, returning its id.
    async fn create_thread(&self) -> Result<String>;

    /// Append a message to a thread.
    async fn append_message(&self, thread_id: &str, role: &str, content: &str) -> Result<()>;

    /// Start a run and return its event stream.
    async fn stream_run(
        &self,
        agent_id: &str,
        thread_id: &str,
        capabilities: &RunCapabilities,
        temperature: Option<f32>,
    ) -> Result<AgentEventStream>;

    /// Upload a file with a purpose tag, returning the backend file id.
    async fn upload_file(&self, name: &str, content: Bytes, purpose: &str) -> Result<String>;

    async fn file_content(&self, file_id: &str) -> Result<Bytes>;

    async fn delete_file(&self, file_id: &str) -> Result<()>;
}

/// HTTP implementation of [`AgentBackend`].
pub struct HttpAgentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpAgentClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(AgentError::Api(format!("HTTP {status}: {text}")))
    }
}

#[async_trait]
impl AgentBackend for HttpAgentClient {
    async fn create_thread(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/threads", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({}))
            .send()
            .await?;
        let value: serde_json::Value = Self::check(response).await?.json().await?;
        value["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::Api("thread response missing id".to_string()))
    }

    async fn append_message(&self, thread_id: &str, role: &str, content: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/threads/{}/messages", self.base_url, thread_id))
            .bearer_auth(&self.api_key)
            .json(&json!({ "role": role, "content": content }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn stream_run(
        &self,
        agent_id: &str,
        thread_id: &str,
        capabilities: &RunCapabilities,
        temperature: Option<f32>,
    ) -> Result<AgentEventStream> {
        let mut body = json!({
            "agent_id": agent_id,
            "stream": true,
            "capabilities": capabilities,
        });
        if let Some(temperature) = temperature {
            body["temperature"] = json!(temperature);
        }

        log::debug!("starting run for agent {agent_id} on thread {thread_id}");
        let response = self
            .client
            .post(format!("{}/threads/{}/runs", self.base_url, thread_id))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .map(|event| {
                let event = event.map_err(|e| AgentError::Stream(e.to_string()))?;
                events::parse_event(event.event.as_str(), event.data.as_str())
            })
            .filter_map(|result| async move {
                match result {
                    Ok(Some(event)) => Some(Ok(event)),
                    Ok(None) => None,
                    Err(err) => Some(Err(err)),
                }
            });

        Ok(Box::pin(stream))
    }

    async fn upload_file(&self, name: &str, content: Bytes, purpose: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(content.to_vec()).file_name(name.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("purpose", purpose.to_string());

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let value: serde_json::Value = Self::check(response).await?.json().await?;
        value["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::Api("file response missing id".to_string()))
    }

    async fn file_content(&self, file_id: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(format!("{}/files/{}/content", self.base_url, file_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(Self::check(response).await?.bytes().await?)
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_thread_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "th_1" })))
            .mount(&server)
            .await;

        let client = HttpAgentClient::new(server.uri(), "k");
        assert_eq!(client.create_thread().await.unwrap(), "th_1");
    }

    #[tokio::test]
    async fn stream_run_decodes_events_in_order() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: message.delta\ndata: {\"text\":\"Hi 【1:0†src】\",\"annotations\":[{\"marker\":\"【1:0†src】\",\"title\":\"Doc\",\"url\":\"https://x\"}]}\n\n",
            "event: run.completed\ndata: {}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/threads/th_1/runs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let client = HttpAgentClient::new(server.uri(), "k");
        let mut stream = client
            .stream_run("agent-1", "th_1", &RunCapabilities::default(), None)
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        match first {
            AgentEvent::MessageDelta { text, annotations } => {
                assert!(text.contains("Hi"));
                assert_eq!(annotations.len(), 1);
                assert_eq!(annotations[0].title, "Doc");
            }
            other => panic!("unexpected event {other:?}"),
        }
        let last = stream.next().await.unwrap().unwrap();
        assert!(matches!(last, AgentEvent::Completed));
    }
}
