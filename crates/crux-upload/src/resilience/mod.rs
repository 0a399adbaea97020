//! ResilienceController: wraps every transfer with per-request timeouts, bounded
//! retry with exponential backoff, a connectivity gate and background keep-alive.

pub mod backoff;
pub mod keepalive;

pub use backoff::RetryPolicy;
pub use keepalive::KeepAlive;

use crate::platform::{
    ConnectivityMonitor, ManualConnectivity, ManualVisibility, NoopPowerHold, PowerHold,
    VisibilityMonitor,
};
use async_trait::async_trait;
use bytes::Bytes;
use crux_core::constants::MANY_CHUNKS_THRESHOLD;
use crux_core::{
    ChunkPlan, ChunkRetryMode, ErrorMetadata, PipelineConfig, ProgressSink, UploadError,
    UploadResult,
};
use crux_storage::{ChunkPlanner, FileDescriptor, TransferClient, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Told about every retry before its backoff delay starts.
#[async_trait]
pub trait RetryObserver: Send + Sync {
    async fn on_retry(&self, retry: u32, delay: Duration, error: &UploadError);
}

#[async_trait]
impl RetryObserver for () {
    async fn on_retry(&self, _retry: u32, _delay: Duration, _error: &UploadError) {}
}

#[derive(Clone)]
pub struct ResilienceController {
    client: TransferClient,
    policy: RetryPolicy,
    base_timeout: Duration,
    chunk_retry_mode: ChunkRetryMode,
    reconnect_settle_delay: Duration,
    heartbeat_interval: Duration,
    connectivity: Arc<dyn ConnectivityMonitor>,
    visibility: Arc<dyn VisibilityMonitor>,
    power: Arc<dyn PowerHold>,
}

impl ResilienceController {
    /// Always-online, foreground, no-op power hold until told otherwise.
    pub fn new(transport: Arc<dyn Transport>, config: &PipelineConfig) -> Self {
        Self {
            client: TransferClient::new(transport),
            policy: RetryPolicy::from_config(config),
            base_timeout: config.request_timeout,
            chunk_retry_mode: config.chunk_retry_mode,
            reconnect_settle_delay: config.reconnect_settle_delay,
            heartbeat_interval: config.heartbeat_interval,
            connectivity: Arc::new(ManualConnectivity::default()),
            visibility: Arc::new(ManualVisibility::default()),
            power: Arc::new(NoopPowerHold),
        }
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn ConnectivityMonitor>) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_visibility(mut self, visibility: Arc<dyn VisibilityMonitor>) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_power_hold(mut self, power: Arc<dyn PowerHold>) -> Self {
        self.power = power;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        self.client.transport()
    }

    /// Per-request timeout: the baseline, doubled for transfers of more than 10 chunks.
    pub fn timeout_for(&self, plan: &ChunkPlan) -> Duration {
        if plan.total_chunks > MANY_CHUNKS_THRESHOLD {
            self.base_timeout * 2
        } else {
            self.base_timeout
        }
    }

    /// Transfer `body` and return the final URL.
    ///
    /// Transient failures are retried up to the policy's budget. Time spent waiting
    /// for connectivity does not count against that budget. `cancel` aborts the
    /// in-flight request.
    pub async fn transfer(
        &self,
        file: &FileDescriptor,
        body: &Bytes,
        plan: ChunkPlan,
        cancel: &CancellationToken,
        progress: &ProgressSink,
        observer: &dyn RetryObserver,
    ) -> UploadResult<String> {
        let keepalive = KeepAlive::start(
            Arc::clone(self.client.transport()),
            self.visibility.as_ref(),
            Arc::clone(&self.power),
            self.heartbeat_interval,
        );

        let result = self
            .run_attempts(file, body, plan, cancel, progress, observer)
            .await;

        keepalive.finish().await;
        result
    }

    async fn run_attempts(
        &self,
        file: &FileDescriptor,
        body: &Bytes,
        mut plan: ChunkPlan,
        cancel: &CancellationToken,
        progress: &ProgressSink,
        observer: &dyn RetryObserver,
    ) -> UploadResult<String> {
        let timeout = self.timeout_for(&plan);
        let mut next_chunk = 0u32;
        let mut retries = 0u32;

        loop {
            self.wait_until_online(cancel).await?;

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                result = self.client.upload(file, body, &plan, next_chunk, timeout, progress) => result,
            };

            let failure = match attempt {
                Ok(url) => {
                    if retries > 0 {
                        tracing::info!(file_name = %file.file_name, retries = retries, "Transfer succeeded after retry");
                    }
                    return Ok(url);
                }
                Err(failure) => failure,
            };

            let error = UploadError::from(failure.error);
            if !error.is_recoverable() || !self.policy.allows_retry(retries) {
                tracing::error!(
                    file_name = %file.file_name,
                    attempts = retries + 1,
                    error = %error,
                    "Transfer failed"
                );
                return Err(error);
            }

            let delay = self.policy.delay_for(retries);
            retries += 1;

            match self.chunk_retry_mode {
                ChunkRetryMode::Resume => next_chunk = failure.next_chunk,
                ChunkRetryMode::Restart => {
                    next_chunk = 0;
                    plan = ChunkPlanner::with_fresh_session(&plan);
                }
            }

            tracing::warn!(
                file_name = %file.file_name,
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                chunk_index = next_chunk,
                error = %error,
                "Transfer failed, retrying"
            );
            observer.on_retry(retries, delay, &error).await;

            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Suspend while offline, then let the connection settle.
    async fn wait_until_online(&self, cancel: &CancellationToken) -> UploadResult<()> {
        let mut online = self.connectivity.subscribe();
        if *online.borrow_and_update() {
            return Ok(());
        }

        tracing::info!("Offline, waiting for connectivity");
        tokio::select! {
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            changed = online.wait_for(|up| *up) => {
                changed.map_err(|_| UploadError::Internal("connectivity monitor closed".to_string()))?;
            }
        }

        tracing::info!(
            settle_ms = self.reconnect_settle_delay.as_millis() as u64,
            "Connectivity restored"
        );
        tokio::select! {
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            _ = tokio::time::sleep(self.reconnect_settle_delay) => Ok(()),
        }
    }
}
