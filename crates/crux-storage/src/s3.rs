//! Direct-upload fallback used when no chunked endpoint is configured.

use crate::error::{TransferError, TransferResult};
use crate::traits::{ChunkHeader, FileDescriptor, Transport};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{ObjectStoreExt, PutPayload};
use std::time::Duration;
use uuid::Uuid;

/// S3 transport
#[derive(Clone, Debug)]
pub struct S3Transport {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    public_url: Option<String>,
}

impl S3Transport {
    /// Credentials are read from the standard `AWS_*` environment variables.
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        public_url: Option<String>,
    ) -> TransferResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| TransferError::Config(e.to_string()))?;

        Ok(Self {
            store,
            bucket,
            region,
            endpoint_url,
            public_url: public_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// `uploads/{target}/{uuid}-{name}`, or `uploads/{uuid}-{name}` without a target.
    fn generate_key(file: &FileDescriptor) -> String {
        let name = sanitize_file_name(&file.file_name);
        match &file.target_entity_id {
            Some(target) => format!(
                "uploads/{}/{}-{}",
                sanitize_file_name(target),
                Uuid::new_v4(),
                name
            ),
            None => format!("uploads/{}-{}", Uuid::new_v4(), name),
        }
    }

    fn base_url(&self) -> String {
        if let Some(ref public) = self.public_url {
            public.clone()
        } else if let Some(ref endpoint) = self.endpoint_url {
            format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket)
        } else {
            format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region)
        }
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url(), key)
    }

    /// Map a public URL back to its object key. Foreign URLs are rejected.
    fn key_from_url(&self, url: &str) -> TransferResult<String> {
        let prefix = format!("{}/", self.base_url());
        url.strip_prefix(&prefix)
            .filter(|key| !key.is_empty() && !key.contains(".."))
            .map(str::to_string)
            .ok_or_else(|| {
                TransferError::Config(format!("url does not belong to bucket {}: {}", self.bucket, url))
            })
    }
}

/// Keep `[A-Za-z0-9._-]`, replace everything else with `_`.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').replace("..", "_");
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl Transport for S3Transport {
    fn backend(&self) -> StorageBackend {
        StorageBackend::S3
    }

    fn supports_chunking(&self) -> bool {
        false
    }

    async fn send_single(
        &self,
        file: &FileDescriptor,
        body: Bytes,
        timeout: Duration,
    ) -> TransferResult<String> {
        let key = Self::generate_key(file);
        let size = body.len() as u64;
        let location = Path::from(key.clone());
        let start = std::time::Instant::now();

        let put = self.store.put(&location, PutPayload::from(body));
        let result = tokio::time::timeout(timeout, put)
            .await
            .map_err(|_| TransferError::Timeout(timeout))?;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            TransferError::Network(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(self.generate_url(&key))
    }

    async fn send_chunk(
        &self,
        _file: &FileDescriptor,
        _chunk: &ChunkHeader,
        _body: Bytes,
        _timeout: Duration,
    ) -> TransferResult<Option<String>> {
        Err(TransferError::Config(
            "S3 backend does not accept chunked transfers".to_string(),
        ))
    }

    async fn delete(&self, url: &str) -> TransferResult<()> {
        let key = self.key_from_url(url)?;
        let location = Path::from(key.clone());
        let start = std::time::Instant::now();

        self.store.delete(&location).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            TransferError::Network(e.to_string())
        })?;

        tracing::info!(bucket = %self.bucket, key = %key, "S3 delete successful");
        Ok(())
    }
}
