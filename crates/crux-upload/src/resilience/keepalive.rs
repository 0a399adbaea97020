//! Background keep-alive: heartbeats while backgrounded, plus a power hold that is
//! re-requested whenever it is lost.

use crate::platform::{PowerHold, VisibilityMonitor};
use crux_storage::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pause before asking again for a hold that was just lost.
const REACQUIRE_DELAY: Duration = Duration::from_secs(1);

/// Running keep-alive for one transfer. Dropping it stops the background task.
pub struct KeepAlive {
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl KeepAlive {
    pub fn start(
        transport: Arc<dyn Transport>,
        visibility: &dyn VisibilityMonitor,
        power: Arc<dyn PowerHold>,
        interval: Duration,
    ) -> Self {
        let stop = CancellationToken::new();
        let foreground = visibility.subscribe();
        let handle = tokio::spawn(run(transport, foreground, power, interval, stop.clone()));

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop and wait until the hold is released.
    pub async fn finish(mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn request_hold(power: &dyn PowerHold) -> bool {
    match power.request().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Power hold refused");
            false
        }
    }
}

async fn run(
    transport: Arc<dyn Transport>,
    foreground: tokio::sync::watch::Receiver<bool>,
    power: Arc<dyn PowerHold>,
    interval: Duration,
    stop: CancellationToken,
) {
    let mut held = request_hold(power.as_ref()).await;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = power.released(), if held => {
                tracing::warn!("Power hold lost, re-requesting");
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(REACQUIRE_DELAY) => {}
                }
                held = request_hold(power.as_ref()).await;
            }
            _ = ticker.tick() => {
                if *foreground.borrow() {
                    continue;
                }
                if let Err(e) = transport.heartbeat().await {
                    tracing::debug!(error = %e, "Heartbeat failed");
                }
            }
        }
    }

    if held {
        power.release().await;
    }
}
