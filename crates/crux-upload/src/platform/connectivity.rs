use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Online/offline signal. `true` means the network is reachable.
pub trait ConnectivityMonitor: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity set by the host (or fixed). `ManualConnectivity::default()` is
/// always online.
#[derive(Debug)]
pub struct ManualConnectivity {
    tx: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    pub fn set_online(&self, online: bool) {
        self.tx.send_replace(online);
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Polls a TCP address and reports whether a connection can be opened.
pub struct TcpConnectivityMonitor {
    tx: watch::Sender<bool>,
    stop: CancellationToken,
}

impl TcpConnectivityMonitor {
    /// Start polling `addr` (`host:port`) every `interval`. Assumes online until
    /// the first probe says otherwise.
    pub fn spawn(addr: String, interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(true);
        let stop = CancellationToken::new();

        let poll_tx = tx.clone();
        let poll_stop = stop.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = poll_stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let online = probe(&addr).await;
                        let changed = poll_tx.send_if_modified(|current| {
                            let changed = *current != online;
                            *current = online;
                            changed
                        });
                        if changed {
                            tracing::info!(addr = %addr, online = online, "Connectivity changed");
                        }
                    }
                }
            }
        });

        Self { tx, stop }
    }
}

async fn probe(addr: &str) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

impl ConnectivityMonitor for TcpConnectivityMonitor {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Drop for TcpConnectivityMonitor {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
