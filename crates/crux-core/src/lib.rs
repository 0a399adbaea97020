//! Crux Core Library
//!
//! Domain models, the upload error taxonomy, configuration and constants shared by
//! the processing, storage and upload crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{ChunkRetryMode, PipelineConfig};
pub use error::{ErrorMetadata, LogLevel, UploadError, UploadResult};
pub use models::{
    ChunkPlan, CompressionPlan, MediaKind, ProgressEvent, ProgressPhase, ProgressSink, SessionHandle,
    TranscodeResult, UploadSessionRecord, UploadStatus, UploadTask,
};
pub use storage_types::StorageBackend;
