//! Domain models for the upload pipeline.

pub mod plan;
pub mod progress;
pub mod session;
pub mod task;

pub use plan::{ChunkPlan, CompressionPlan, TranscodeResult};
pub use progress::{ProgressEvent, ProgressPhase, ProgressSink};
pub use session::{SessionHandle, UploadSessionRecord, UploadStatus};
pub use task::{MediaKind, UploadTask};
