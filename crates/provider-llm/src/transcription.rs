//! Transcription backend contract.
//!
//! Small audio is transcribed synchronously; audio over the threshold is
//! submitted as an asynchronous chunked job whose transcript arrives
//! out-of-band (polled by an external collaborator, not this crate).

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LLMError, Result};

/// Descriptor of a submitted asynchronous transcription job.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PendingTranscription {
    pub job_id: String,
    pub chunk_count: u32,
    pub file_name: String,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Synchronous transcription; the transcript is available on return.
    async fn transcribe(&self, audio: Bytes, file_name: &str) -> Result<String>;

    /// Submit an asynchronous chunked-transcription job.
    async fn submit_chunked(&self, audio: Bytes, file_name: &str)
        -> Result<PendingTranscription>;
}

/// HTTP transcription client.
pub struct HttpTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTranscriber {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn part(audio: Bytes, file_name: &str) -> reqwest::multipart::Form {
        let file = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(file_name.to_string());
        reqwest::multipart::Form::new().part("file", file)
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: Bytes, file_name: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(Self::part(audio, file_name))
            .send()
            .await
            .map_err(LLMError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.map_err(LLMError::Http)?;
            return Err(LLMError::Api(format!(
                "transcription HTTP {status}: {text}"
            )));
        }

        let value: Value = response.json().await.map_err(LLMError::Http)?;
        value["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LLMError::Api("transcription response missing text".to_string()))
    }

    async fn submit_chunked(
        &self,
        audio: Bytes,
        file_name: &str,
    ) -> Result<PendingTranscription> {
        let response = self
            .client
            .post(format!("{}/transcriptions/jobs", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(Self::part(audio, file_name))
            .send()
            .await
            .map_err(LLMError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.map_err(LLMError::Http)?;
            return Err(LLMError::Api(format!(
                "transcription job HTTP {status}: {text}"
            )));
        }

        let value: Value = response.json().await.map_err(LLMError::Http)?;
        let job_id = value["job_id"]
            .as_str()
            .ok_or_else(|| LLMError::Api("job response missing job_id".to_string()))?;
        let chunk_count = value["chunk_count"].as_u64().unwrap_or(0) as u32;

        Ok(PendingTranscription {
            job_id: job_id.to_string(),
            chunk_count,
            file_name: file_name.to_string(),
        })
    }
}
