//! Blob storage client contract and sandboxed temp-file handling.
//!
//! The pipeline depends on the [`BlobStorage`] trait only; the HTTP
//! implementation here speaks a plain object-store REST shape. Uploaded
//! files live under `{user_id}/uploads/files/{blob_id}`, with a parallel
//! cached-plain-text path for pre-extracted documents.

pub mod temp;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use thiserror::Error;

pub use temp::{validate_blob_id, TempFileGuard, TempSandbox};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob identifier: {0}")]
    InvalidBlobId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Blob path for a user upload.
pub fn upload_path(user_id: &str, blob_id: &str) -> String {
    format!("{user_id}/uploads/files/{blob_id}")
}

/// Parallel path holding pre-extracted plain text for a document blob.
pub fn cached_text_path(user_id: &str, blob_id: &str) -> String {
    format!("{user_id}/uploads/files/{blob_id}.txt")
}

/// Storage contract consumed by the pipeline.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Size of the blob in bytes without fetching the body.
    async fn get_blob_size(&self, path: &str) -> Result<u64>;

    /// Fetch the full blob body.
    async fn get(&self, path: &str) -> Result<Bytes>;

    async fn blob_exists(&self, path: &str) -> Result<bool>;
}

/// HTTP implementation against an object-store REST endpoint.
///
/// Reads go through a retry client (3 attempts, exponential backoff) so
/// transient storage hiccups do not fail a whole chat request.
pub struct HttpBlobStorage {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

impl HttpBlobStorage {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn blob_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl BlobStorage for HttpBlobStorage {
    async fn get_blob_size(&self, path: &str) -> Result<u64> {
        let response = self
            .client
            .head(self.blob_url(path))
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(StoreError::Http(format!(
                "HEAD {} -> {}",
                path,
                response.status()
            )));
        }

        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| StoreError::Http(format!("missing content-length for {path}")))
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(self.blob_url(path))
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(StoreError::Http(format!(
                "GET {} -> {}",
                path,
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))
    }

    async fn blob_exists(&self, path: &str) -> Result<bool> {
        match self.get_blob_size(path).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_blob_size_reads_content_length_from_head() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/u1/uploads/files/b1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 123]))
            .mount(&server)
            .await;

        let store = HttpBlobStorage::new(server.uri(), "k");
        let size = store
            .get_blob_size(&upload_path("u1", "b1"))
            .await
            .unwrap();
        assert_eq!(size, 123);
    }

    #[tokio::test]
    async fn missing_blob_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpBlobStorage::new(server.uri(), "k");
        let err = store.get_blob_size("u1/uploads/files/gone").await;
        assert!(matches!(err, Err(StoreError::NotFound(_))));
        assert!(!store.blob_exists("u1/uploads/files/gone").await.unwrap());
    }

    #[test]
    fn upload_path_follows_convention() {
        assert_eq!(upload_path("u1", "b1"), "u1/uploads/files/b1");
        assert_eq!(cached_text_path("u1", "b1"), "u1/uploads/files/b1.txt");
    }
}
