//! ProgressReporter: one broadcast channel of [`ProgressEvent`]s for every task the
//! orchestrator runs.
//!
//! Each task publishes through its own [`TaskProgress`], which folds compression and
//! transfer progress into a single weighted `overall` value and drops anything that
//! would move it backwards. The stages themselves publish stage-local percent to a
//! [`ProgressSink`]; [`TaskProgress::track`] relays that channel while a stage runs.

use crux_core::{MediaKind, ProgressEvent, ProgressPhase, ProgressSink};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// Share of the overall bar given to compression. Transfer gets the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWeights {
    compression: u8,
}

impl PhaseWeights {
    pub fn new(compression: u8) -> Self {
        Self {
            compression: compression.min(100),
        }
    }

    /// Video re-encodes dominate their pipeline, image encodes are quicker. A task
    /// that skips compression spends the whole bar on transfer.
    pub fn for_task(kind: MediaKind, transcodes: bool) -> Self {
        match (kind, transcodes) {
            (_, false) => Self::new(0),
            (MediaKind::Video, true) => Self::new(45),
            (MediaKind::Image | MediaKind::Thumbnail, true) => Self::new(30),
        }
    }

    pub fn compression(&self) -> u8 {
        self.compression
    }

    pub fn overall(&self, phase: ProgressPhase, value: u8) -> u8 {
        let value = u32::from(value.min(100));
        let compression = u32::from(self.compression);
        let overall = match phase {
            ProgressPhase::Compressing => value * compression / 100,
            ProgressPhase::Uploading => compression + value * (100 - compression) / 100,
        };
        overall as u8
    }
}

#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Events published after this call. Slow subscribers may observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn task(&self, task_id: Uuid, weights: PhaseWeights) -> TaskProgress {
        TaskProgress {
            task_id,
            weights,
            tx: self.tx.clone(),
            last: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Publisher for a single task. Clones share the high-water mark.
#[derive(Debug, Clone)]
pub struct TaskProgress {
    task_id: Uuid,
    weights: PhaseWeights,
    tx: broadcast::Sender<ProgressEvent>,
    last: Arc<Mutex<Option<u8>>>,
}

impl TaskProgress {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn weights(&self) -> PhaseWeights {
        self.weights
    }

    /// Last published overall value, if any.
    pub fn current(&self) -> Option<u8> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn compression(&self, value: u8) {
        self.publish(ProgressPhase::Compressing, value);
    }

    pub fn transfer(&self, value: u8) {
        self.publish(ProgressPhase::Uploading, value);
    }

    pub fn complete(&self) {
        self.publish(ProgressPhase::Uploading, 100);
    }

    /// Run `stage` to completion, forwarding what it publishes on `rx` as `phase`
    /// progress. The last value is flushed once the stage returns.
    pub async fn track<F: Future>(
        &self,
        phase: ProgressPhase,
        mut rx: watch::Receiver<u8>,
        stage: F,
    ) -> F::Output {
        tokio::pin!(stage);
        let mut open = true;
        loop {
            tokio::select! {
                biased;
                changed = rx.changed(), if open => match changed {
                    Ok(()) => {
                        let value = *rx.borrow_and_update();
                        self.publish(phase, value);
                    }
                    Err(_) => open = false,
                },
                output = &mut stage => {
                    let value = *rx.borrow();
                    self.publish(phase, value);
                    return output;
                }
            }
        }
    }

    /// A fresh stage channel for [`TaskProgress::track`].
    pub fn stage() -> (ProgressSink, watch::Receiver<u8>) {
        ProgressSink::channel()
    }

    fn publish(&self, phase: ProgressPhase, phase_value: u8) {
        let overall = self.weights.overall(phase, phase_value);

        {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*last, Some(previous) if overall <= previous) {
                return;
            }
            *last = Some(overall);
        }

        // No subscribers is fine.
        let _ = self.tx.send(ProgressEvent {
            task_id: self.task_id,
            overall,
            phase,
            phase_value: phase_value.min(100),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut broadcast::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_weights() {
        let video = PhaseWeights::for_task(MediaKind::Video, true);
        assert_eq!(video.overall(ProgressPhase::Compressing, 100), 45);
        assert_eq!(video.overall(ProgressPhase::Uploading, 0), 45);
        assert_eq!(video.overall(ProgressPhase::Uploading, 50), 72);
        assert_eq!(video.overall(ProgressPhase::Uploading, 100), 100);

        let thumb = PhaseWeights::for_task(MediaKind::Thumbnail, true);
        assert_eq!(thumb.overall(ProgressPhase::Compressing, 50), 15);

        let small_video = PhaseWeights::for_task(MediaKind::Video, false);
        assert_eq!(small_video.overall(ProgressPhase::Uploading, 0), 0);
        assert_eq!(small_video.overall(ProgressPhase::Uploading, 40), 40);
    }

    #[test]
    fn test_never_goes_backwards() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        let task = reporter.task(Uuid::new_v4(), PhaseWeights::for_task(MediaKind::Video, true));

        task.compression(0);
        task.compression(60);
        task.compression(40);
        task.transfer(0);
        task.transfer(30);
        task.compression(100);
        task.complete();

        let overall: Vec<u8> = drain(&mut rx).iter().map(|e| e.overall).collect();
        assert_eq!(overall, vec![0, 27, 45, 61, 100]);
        assert_eq!(task.current(), Some(100));
    }

    #[test]
    fn test_first_event_is_always_published() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        let task = reporter.task(Uuid::new_v4(), PhaseWeights::for_task(MediaKind::Video, false));

        task.transfer(0);
        task.transfer(0);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].overall, 0);
        assert_eq!(events[0].phase, ProgressPhase::Uploading);
    }

    #[test]
    fn test_clones_share_high_water_mark() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        let task = reporter.task(Uuid::new_v4(), PhaseWeights::new(0));
        let clone = task.clone();

        task.transfer(50);
        clone.transfer(10);

        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(clone.current(), Some(50));
    }

    #[tokio::test]
    async fn test_track_relays_stage_sink() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        let task = reporter.task(Uuid::new_v4(), PhaseWeights::for_task(MediaKind::Video, true));

        let (sink, stage_rx) = TaskProgress::stage();
        let output = task
            .track(ProgressPhase::Compressing, stage_rx, async move {
                sink.publish(20);
                tokio::task::yield_now().await;
                sink.publish(60);
                tokio::task::yield_now().await;
                sink.publish(100);
                "encoded"
            })
            .await;

        assert_eq!(output, "encoded");
        let events = drain(&mut rx);
        assert!(events.iter().all(|e| e.phase == ProgressPhase::Compressing));
        assert_eq!(events.last().map(|e| e.overall), Some(45));
        assert!(events.windows(2).all(|w| w[0].overall < w[1].overall));
    }

    #[tokio::test]
    async fn test_track_flushes_value_published_without_yield() {
        let reporter = ProgressReporter::new();
        let task = reporter.task(Uuid::new_v4(), PhaseWeights::new(0));
        let (sink, stage_rx) = TaskProgress::stage();

        task.track(ProgressPhase::Uploading, stage_rx, async {
            sink.publish(70);
        })
        .await;

        assert_eq!(task.current(), Some(70));
    }

    #[test]
    fn test_publishing_without_subscribers() {
        let reporter = ProgressReporter::default();
        let task = reporter.task(Uuid::new_v4(), PhaseWeights::new(30));
        task.complete();
        assert_eq!(task.current(), Some(100));
    }
}
