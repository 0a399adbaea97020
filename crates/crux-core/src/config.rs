//! Configuration module
//!
//! Pipeline configuration loaded from the environment (a `.env` file is honoured).
//! Every knob has a default, so an empty environment yields a usable config once
//! a storage backend is configured.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const REQUEST_TIMEOUT_SECS: u64 = 300;
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 1000;
const RECONNECT_SETTLE_MS: u64 = 1000;
const HEARTBEAT_INTERVAL_SECS: u64 = 20;
const DEDUP_WINDOW_SECS: u64 = 600;
const MAX_ALLOWED_RETRIES: u32 = 10;

/// How a chunked transfer continues after a transient failure mid-sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkRetryMode {
    /// Continue from the first unacknowledged chunk under the same session id.
    #[default]
    Resume,
    /// Start again from chunk 0 under a fresh session id.
    Restart,
}

impl FromStr for ChunkRetryMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resume" => Ok(ChunkRetryMode::Resume),
            "restart" => Ok(ChunkRetryMode::Restart),
            _ => Err(anyhow::anyhow!("Invalid chunk retry mode: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    // Primary chunked endpoint
    pub upload_url: Option<String>,
    pub storage_backend: StorageBackend,
    pub api_token: Option<String>,
    // Fallback direct-upload backend (credentials come from AWS_* variables)
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_public_url: Option<String>,
    // Video toolchain
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    // Resilience
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub reconnect_settle_delay: Duration,
    pub heartbeat_interval: Duration,
    pub chunk_retry_mode: ChunkRetryMode,
    // Session logging
    pub dedup_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_url: None,
            storage_backend: StorageBackend::Chunked,
            api_token: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            s3_public_url: None,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            reconnect_settle_delay: Duration::from_millis(RECONNECT_SETTLE_MS),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            chunk_retry_mode: ChunkRetryMode::Resume,
            dedup_window: Duration::from_secs(DEDUP_WINDOW_SECS),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    parse_value(key, env_opt(key).as_deref(), default)
}

/// Unset or blank yields `default`; anything unparseable is a configuration error.
fn parse_value<T: FromStr>(key: &str, raw: Option<&str>, default: T) -> Result<T, anyhow::Error> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|_| {
            tracing::warn!(key = %key, value = %value, "Malformed configuration value");
            anyhow::anyhow!("{} has an invalid value: {}", key, value)
        }),
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_backend = match env_opt("CRUX_STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Chunked,
        };

        let chunk_retry_mode = match env_opt("CRUX_CHUNK_RETRY_MODE") {
            Some(value) => value.parse::<ChunkRetryMode>()?,
            None => ChunkRetryMode::default(),
        };

        let config = Self {
            upload_url: env_opt("CRUX_UPLOAD_URL").map(|u| u.trim_end_matches('/').to_string()),
            storage_backend,
            api_token: env_opt("CRUX_API_TOKEN"),
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            s3_public_url: env_opt("S3_PUBLIC_URL"),
            ffmpeg_path: env_opt("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: env_opt("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            request_timeout: Duration::from_secs(env_parse(
                "CRUX_REQUEST_TIMEOUT_SECS",
                REQUEST_TIMEOUT_SECS,
            )?),
            max_retries: env_parse("CRUX_MAX_RETRIES", MAX_RETRIES)?,
            retry_base_delay: Duration::from_millis(env_parse(
                "CRUX_RETRY_BASE_DELAY_MS",
                RETRY_BASE_DELAY_MS,
            )?),
            reconnect_settle_delay: Duration::from_millis(env_parse(
                "CRUX_RECONNECT_SETTLE_MS",
                RECONNECT_SETTLE_MS,
            )?),
            heartbeat_interval: Duration::from_secs(env_parse(
                "CRUX_HEARTBEAT_INTERVAL_SECS",
                HEARTBEAT_INTERVAL_SECS,
            )?),
            chunk_retry_mode,
            dedup_window: Duration::from_secs(env_parse(
                "CRUX_DEDUP_WINDOW_SECS",
                DEDUP_WINDOW_SECS,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Backend actually used: the primary endpoint wins only when it is configured.
    pub fn effective_backend(&self) -> StorageBackend {
        match self.storage_backend {
            StorageBackend::Chunked if self.upload_url.is_some() => StorageBackend::Chunked,
            _ => StorageBackend::S3,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.upload_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "CRUX_UPLOAD_URL must be an http(s) URL, got {}",
                    url
                ));
            }
        }

        if self.effective_backend() == StorageBackend::S3
            && (self.s3_bucket.is_none() || self.s3_region.is_none())
        {
            return Err(anyhow::anyhow!(
                "No upload endpoint configured: set CRUX_UPLOAD_URL, or S3_BUCKET and S3_REGION for the fallback backend"
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "CRUX_REQUEST_TIMEOUT_SECS must be greater than 0"
            ));
        }

        if self.max_retries > MAX_ALLOWED_RETRIES {
            return Err(anyhow::anyhow!(
                "CRUX_MAX_RETRIES must be at most {}",
                MAX_ALLOWED_RETRIES
            ));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(anyhow::anyhow!(
                "CRUX_HEARTBEAT_INTERVAL_SECS must be greater than 0"
            ));
        }

        Ok(())
    }
}
