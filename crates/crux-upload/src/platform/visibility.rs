use tokio::sync::watch;

/// Foreground/background signal. `true` means the app is in the foreground.
pub trait VisibilityMonitor: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Visibility toggled by the host. Starts in the foreground.
#[derive(Debug)]
pub struct ManualVisibility {
    tx: watch::Sender<bool>,
}

impl ManualVisibility {
    pub fn new(foreground: bool) -> Self {
        let (tx, _rx) = watch::channel(foreground);
        Self { tx }
    }

    pub fn set_foreground(&self, foreground: bool) {
        self.tx.send_replace(foreground);
    }
}

impl Default for ManualVisibility {
    fn default() -> Self {
        Self::new(true)
    }
}

impl VisibilityMonitor for ManualVisibility {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
