//! Crux Upload Library
//!
//! Control logic of the media upload pipeline: the [`UploadOrchestrator`] entry
//! point, the [`ResilienceController`] that keeps transfers alive across flaky
//! networks, the [`ProgressReporter`] event channel and the [`SessionLogger`]
//! interface used for duplicate detection and status history.

pub mod collaborators;
pub mod orchestrator;
pub mod platform;
pub mod progress;
pub mod resilience;
pub mod session;

// Re-export commonly used types
pub use collaborators::{
    Notification, NoopRecordUpdater, RecordMedia, RecordUpdater, TracingNotifier, UploadNotifier,
};
pub use orchestrator::{LegRole, LegState, RecordOutcome, RecordUpload, UploadOrchestrator};
pub use platform::{
    ConnectivityMonitor, ManualConnectivity, ManualVisibility, NoopPowerHold, PowerHold,
    TcpConnectivityMonitor, VisibilityMonitor,
};
pub use progress::{PhaseWeights, ProgressReporter, TaskProgress};
pub use resilience::{KeepAlive, ResilienceController, RetryObserver, RetryPolicy};
pub use session::{fingerprint, InMemorySessionLogger, SessionLogger};
