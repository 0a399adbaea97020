//! Transport abstraction trait
//!
//! A transport performs exactly one request per call. Chunk sequencing, timeouts
//! and retries live above it ([`crate::TransferClient`] and the resilience layer).

use crate::error::TransferResult;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Descriptive metadata sent with every request of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub target_entity_id: Option<String>,
}

/// Position of one chunk inside a chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    pub index: u32,
    pub total: u32,
    pub session_id: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn backend(&self) -> StorageBackend;

    /// Whether the backend accepts the chunked protocol. Others get single-shot only.
    fn supports_chunking(&self) -> bool;

    /// Upload a whole file. Returns the final asset URL.
    async fn send_single(
        &self,
        file: &FileDescriptor,
        body: Bytes,
        timeout: Duration,
    ) -> TransferResult<String>;

    /// Upload one chunk. Only the last chunk's response is expected to carry a URL.
    async fn send_chunk(
        &self,
        file: &FileDescriptor,
        chunk: &ChunkHeader,
        body: Bytes,
        timeout: Duration,
    ) -> TransferResult<Option<String>>;

    /// Cheap request that keeps intermediaries from closing an idle connection.
    async fn heartbeat(&self) -> TransferResult<()> {
        Ok(())
    }

    /// Remove a previously uploaded asset by URL.
    async fn delete(&self, url: &str) -> TransferResult<()>;
}
