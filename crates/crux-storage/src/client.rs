//! TransferClient: drives a single-shot or chunked transfer over a [`Transport`].

use crate::error::TransferError;
use crate::traits::{ChunkHeader, FileDescriptor, Transport};
use bytes::Bytes;
use crux_core::{ChunkPlan, ProgressSink};
use std::sync::Arc;
use std::time::Duration;

/// A failed transfer attempt and how far it got.
#[derive(Debug, Clone)]
pub struct TransferFailure {
    pub error: TransferError,
    /// First chunk the server has not acknowledged.
    pub next_chunk: u32,
}

#[derive(Clone)]
pub struct TransferClient {
    transport: Arc<dyn Transport>,
}

impl TransferClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Whether `plan` can go out as chunks on this transport.
    pub fn uses_chunks(&self, plan: &ChunkPlan) -> bool {
        !plan.is_single_shot() && self.transport.supports_chunking()
    }

    /// Send `body` according to `plan`, starting at chunk `start_chunk`.
    ///
    /// Chunks go out strictly in index order, one request at a time. Every request
    /// gets its own `timeout`. Transfer percent is published to `progress` after
    /// each acknowledged request.
    pub async fn upload(
        &self,
        file: &FileDescriptor,
        body: &Bytes,
        plan: &ChunkPlan,
        start_chunk: u32,
        timeout: Duration,
        progress: &ProgressSink,
    ) -> Result<String, TransferFailure> {
        if !self.uses_chunks(plan) {
            let request = self.transport.send_single(file, body.clone(), timeout);
            let url = with_timeout(timeout, request).await.map_err(|error| TransferFailure {
                error,
                next_chunk: 0,
            })?;
            progress.publish(100);
            return Ok(url);
        }

        let session_id = plan.session_id.clone().ok_or_else(|| TransferFailure {
            error: TransferError::Config("chunked plan without session id".to_string()),
            next_chunk: start_chunk,
        })?;

        let mut final_url = None;
        for index in start_chunk..plan.total_chunks {
            let range = plan.chunk_range(index);
            let chunk = body.slice(range.start as usize..range.end as usize);
            let header = ChunkHeader {
                index,
                total: plan.total_chunks,
                session_id: session_id.clone(),
            };

            tracing::debug!(
                session_id = %session_id,
                chunk_index = index,
                total_chunks = plan.total_chunks,
                size_bytes = chunk.len(),
                "Sending chunk"
            );

            let request = self.transport.send_chunk(file, &header, chunk, timeout);
            let url = with_timeout(timeout, request).await.map_err(|error| TransferFailure {
                error,
                next_chunk: index,
            })?;

            let sent = range.end;
            progress.publish(((sent * 100) / plan.file_size.max(1)) as u8);

            if index + 1 == plan.total_chunks {
                final_url = url;
            }
        }

        final_url.ok_or_else(|| TransferFailure {
            error: TransferError::InvalidResponse(
                "final chunk response did not include a url".to_string(),
            ),
            next_chunk: plan.total_chunks - 1,
        })
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    request: impl std::future::Future<Output = Result<T, TransferError>>,
) -> Result<T, TransferError> {
    tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| TransferError::Timeout(timeout))?
}
