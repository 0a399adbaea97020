//! Crux Storage Library
//!
//! Wire protocol and transfer for the upload pipeline: the [`ChunkPlanner`], the
//! [`Transport`] trait with an HTTP implementation for the primary chunked endpoint
//! and an S3 implementation for the direct-upload fallback, and the
//! [`TransferClient`] that drives single-shot or chunked transfers over a transport.
//!
//! # Primary endpoint protocol
//!
//! - `POST {base}/upload`: body is the whole file or one chunk, metadata travels in
//!   `x-*` headers. Response `{ success, url?, error? }`.
//! - `POST {base}/delete`: body `{ url }`.
//! - `HEAD {base}/upload`: keep-alive heartbeat.

pub mod chunk;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod factory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod wire;

// Re-export commonly used types
pub use chunk::ChunkPlanner;
pub use client::{TransferClient, TransferFailure};
pub use crux_core::StorageBackend;
pub use endpoint::HttpTransport;
pub use error::{TransferError, TransferResult};
pub use factory::create_transport;
#[cfg(feature = "storage-s3")]
pub use s3::S3Transport;
pub use traits::{ChunkHeader, FileDescriptor, Transport};
pub use wire::{DeleteRequest, UploadResponse};
