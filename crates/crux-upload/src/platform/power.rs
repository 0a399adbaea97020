use async_trait::async_trait;

/// Best-effort request that keeps the device from suspending networking.
#[async_trait]
pub trait PowerHold: Send + Sync {
    /// Request the hold. Refusal is not an error for the upload.
    async fn request(&self) -> Result<(), String>;

    /// Resolves when a previously granted hold is lost.
    async fn released(&self);

    async fn release(&self);
}

/// Native processes need no hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPowerHold;

#[async_trait]
impl PowerHold for NoopPowerHold {
    async fn request(&self) -> Result<(), String> {
        Ok(())
    }

    async fn released(&self) {
        std::future::pending::<()>().await
    }

    async fn release(&self) {}
}
