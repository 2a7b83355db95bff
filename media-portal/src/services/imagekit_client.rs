//! HTTP clients behind the upload widget: the credential endpoint and the
//! ImageKit upload API.

use crate::models::{UploadCredentials, UploadResponse};
use crate::upload::{ProgressFn, UploadAuthSource, UploadError, UploadParams, Uploader};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, StatusCode};
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Fetches `{signature, expire, token}` from the application's auth endpoint.
pub struct HttpUploadAuth {
    client: Client,
    url: String,
}

impl HttpUploadAuth {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl UploadAuthSource for HttpUploadAuth {
    async fn get_upload_auth(&self) -> Result<UploadCredentials, UploadError> {
        let response = self.client.traced_get(&self.url).send().await.map_err(|e| {
            tracing::error!("Failed to send GET request to {}: {}", self.url, e);
            UploadError::Auth(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Auth(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        response
            .json::<UploadCredentials>()
            .await
            .map_err(|e| UploadError::Auth(format!("invalid credential response: {}", e)))
    }
}

/// Client for `POST /api/v1/files/upload`.
pub struct ImageKitClient {
    client: Client,
    upload_url: String,
    chunk_size: usize,
}

impl ImageKitClient {
    pub fn new(client: Client, upload_url: &str) -> Self {
        Self {
            client,
            upload_url: upload_url.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Granularity of progress reports.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn file_part(&self, params: &mut UploadParams, progress: ProgressFn) -> Result<Part, UploadError> {
        let data = Bytes::from(std::mem::take(&mut params.file.data));
        let total = data.len() as u64;
        let chunk_size = self.chunk_size;

        // Slices share the one buffer
        let sent = Arc::new(AtomicU64::new(0));
        let stream = futures::stream::iter((0..data.len()).step_by(chunk_size)).map(move |start| {
            let chunk = data.slice(start..(start + chunk_size).min(data.len()));
            let len = chunk.len() as u64;
            let loaded = sent.fetch_add(len, Ordering::SeqCst) + len;
            progress(loaded, total);
            Ok::<_, std::io::Error>(chunk)
        });

        Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(params.file_name.clone())
            .mime_str(mime_or_default(&params.file.mime_type))
            .map_err(|e| UploadError::InvalidRequest(format!("invalid MIME type: {}", e)))
    }
}

fn mime_or_default(mime_type: &str) -> &str {
    if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status.to_string(),
    }
}

fn classify(status: StatusCode, message: String) -> UploadError {
    if status.is_client_error() {
        UploadError::InvalidRequest(message)
    } else {
        UploadError::Server(message)
    }
}

#[async_trait]
impl Uploader for ImageKitClient {
    async fn upload(
        &self,
        mut params: UploadParams,
        progress: ProgressFn,
    ) -> Result<UploadResponse, UploadError> {
        let part = self.file_part(&mut params, progress)?;

        let form = Form::new()
            .part("file", part)
            .text("fileName", params.file_name)
            .text("publicKey", params.public_key)
            .text("signature", params.signature)
            .text("expire", params.expire.to_string())
            .text("token", params.token)
            .text("useUniqueFileName", "true");

        let response = self
            .client
            .traced_post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send upload to {}: {}", self.upload_url, e);
                UploadError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(classify(status, message));
        }

        response
            .json::<UploadResponse>()
            .await
            .map_err(|e| UploadError::Server(format!("invalid upload response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify(StatusCode::BAD_REQUEST, "bad".into()),
            UploadError::InvalidRequest("bad".into())
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, "expired".into()),
            UploadError::InvalidRequest("expired".into())
        );
        assert_eq!(
            classify(StatusCode::BAD_GATEWAY, "down".into()),
            UploadError::Server("down".into())
        );
    }

    #[test]
    fn test_unknown_mime_type_falls_back() {
        assert_eq!(mime_or_default(""), "application/octet-stream");
        assert_eq!(mime_or_default("video/mp4"), "video/mp4");
    }

    #[tokio::test]
    async fn test_unconfigured_auth_url_is_an_auth_error() {
        let auth = HttpUploadAuth::new(Client::new(), "");
        assert!(matches!(
            auth.get_upload_auth().await,
            Err(UploadError::Auth(_))
        ));
    }

    #[test]
    fn test_chunk_size_never_zero() {
        let client = ImageKitClient::new(Client::new(), "http://localhost").with_chunk_size(0);
        assert_eq!(client.chunk_size, 1);
    }
}
