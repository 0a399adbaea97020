use crate::endpoint::HttpTransport;
#[cfg(feature = "storage-s3")]
use crate::S3Transport;
use crate::{StorageBackend, TransferError, TransferResult, Transport};
use crux_core::PipelineConfig;
use std::sync::Arc;

/// Create the transport selected by configuration
pub fn create_transport(config: &PipelineConfig) -> TransferResult<Arc<dyn Transport>> {
    match config.effective_backend() {
        StorageBackend::Chunked => {
            let base_url = config.upload_url.as_deref().ok_or_else(|| {
                TransferError::Config("CRUX_UPLOAD_URL not configured".to_string())
            })?;
            tracing::info!(base_url = %base_url, "Using chunked upload endpoint");
            Ok(Arc::new(HttpTransport::new(
                base_url,
                config.api_token.clone(),
            )?))
        }

        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| TransferError::Config("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region.clone().ok_or_else(|| {
                TransferError::Config("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            tracing::info!(bucket = %bucket, region = %region, "Using S3 fallback upload");

            let transport = S3Transport::new(
                bucket,
                region,
                config.s3_endpoint.clone(),
                config.s3_public_url.clone(),
            )?;
            Ok(Arc::new(transport))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(TransferError::Config(
            "S3 backend not available (storage-s3 feature not enabled)".to_string(),
        )),
    }
}
