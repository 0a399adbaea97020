//! HTTP transport for the primary chunked upload endpoint.

use crate::error::{TransferError, TransferResult};
use crate::traits::{ChunkHeader, FileDescriptor, Transport};
use crate::wire::{DeleteRequest, UploadResponse};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use crux_core::constants::headers;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_token: Option<String>) -> TransferResult<Self> {
        // Per-request timeouts are applied on each call
        let client = Client::builder()
            .build()
            .map_err(|e| TransferError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn upload_request(&self, file: &FileDescriptor, body: Bytes, timeout: Duration) -> RequestBuilder {
        let mut request = self
            .client
            .post(self.build_url("/upload"))
            .timeout(timeout)
            .header(headers::FILE_NAME, file.file_name.as_str())
            .header(headers::FILE_SIZE, file.file_size.to_string())
            .header(headers::FILE_TYPE, file.mime_type.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body);

        if let Some(target) = &file.target_entity_id {
            request = request.header(headers::TARGET_ID, target.as_str());
        }

        self.apply_auth(request)
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration) -> TransferResult<Option<String>> {
        let response = request
            .send()
            .await
            .map_err(|e| TransferError::from_reqwest(e, timeout))?;
        Self::read_upload_response(response, timeout).await
    }

    async fn read_upload_response(response: Response, timeout: Duration) -> TransferResult<Option<String>> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransferError::from_reqwest(e, timeout))?;

        if !status.is_success() {
            return Err(TransferError::Server {
                status: status.as_u16(),
                message: UploadResponse::error_message(&body),
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| TransferError::InvalidResponse(e.to_string()))?;
        parsed.into_result(status.as_u16())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Chunked
    }

    fn supports_chunking(&self) -> bool {
        true
    }

    async fn send_single(
        &self,
        file: &FileDescriptor,
        body: Bytes,
        timeout: Duration,
    ) -> TransferResult<String> {
        let request = self.upload_request(file, body, timeout);
        self.send(request, timeout).await?.ok_or_else(|| {
            TransferError::InvalidResponse("upload response did not include a url".to_string())
        })
    }

    async fn send_chunk(
        &self,
        file: &FileDescriptor,
        chunk: &ChunkHeader,
        body: Bytes,
        timeout: Duration,
    ) -> TransferResult<Option<String>> {
        let request = self
            .upload_request(file, body, timeout)
            .header(headers::CHUNK_INDEX, chunk.index.to_string())
            .header(headers::TOTAL_CHUNKS, chunk.total.to_string())
            .header(headers::SESSION_ID, chunk.session_id.as_str());
        self.send(request, timeout).await
    }

    async fn heartbeat(&self) -> TransferResult<()> {
        let request = self
            .client
            .head(self.build_url("/upload"))
            .timeout(HEARTBEAT_TIMEOUT);
        self.apply_auth(request)
            .send()
            .await
            .map_err(|e| TransferError::from_reqwest(e, HEARTBEAT_TIMEOUT))?;
        Ok(())
    }

    async fn delete(&self, url: &str) -> TransferResult<()> {
        let request = self
            .client
            .post(self.build_url("/delete"))
            .timeout(HEARTBEAT_TIMEOUT)
            .json(&DeleteRequest {
                url: url.to_string(),
            });
        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(|e| TransferError::from_reqwest(e, HEARTBEAT_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransferError::Server {
                status: status.as_u16(),
                message: UploadResponse::error_message(&body),
            });
        }
        Ok(())
    }
}
