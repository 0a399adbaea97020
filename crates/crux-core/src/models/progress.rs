use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Compressing,
    Uploading,
}

/// One progress observation for a single upload task.
///
/// `overall` never decreases for the lifetime of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: Uuid,
    pub overall: u8,
    pub phase: ProgressPhase,
    pub phase_value: u8,
}

/// Publishing end of a stage-local progress channel, in percent (0-100).
///
/// Transcoders and the transfer client publish here; whoever created the channel
/// holds the receiver. Values only move forward.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Arc<watch::Sender<u8>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// A sink nobody listens to.
    pub fn detached() -> Self {
        Self::channel().0
    }

    pub fn publish(&self, percent: u8) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }
}
