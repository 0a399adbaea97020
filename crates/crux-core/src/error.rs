//! Error types module
//!
//! All pipeline failures are unified under [`UploadError`]. Lower layers keep their
//! own error enums (codec, transfer) and convert into this taxonomy at the crate
//! boundary, so retry decisions are made in exactly one place:
//! [`ErrorMetadata::is_recoverable`].

use std::time::Duration;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be handled and presented.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "NETWORK_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether the failed operation may be retried automatically
    fn is_recoverable(&self) -> bool;

    /// User-facing message
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Duplicate upload: {0}")]
    Duplicate(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    /// Status codes that signal a transient condition on the server side.
    pub fn is_retryable_status(status: u16) -> bool {
        status >= 500 || status == 408 || status == 429
    }

    /// Errors that end the whole task immediately, before any transfer happens.
    pub fn is_fatal_precondition(&self) -> bool {
        matches!(self, UploadError::Validation(_) | UploadError::Duplicate(_))
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            UploadError::Validation(_) => "VALIDATION_ERROR",
            UploadError::Duplicate(_) => "DUPLICATE_UPLOAD",
            UploadError::Compression(_) => "COMPRESSION_ERROR",
            UploadError::Network(_) => "NETWORK_ERROR",
            UploadError::Timeout(_) => "TIMEOUT",
            UploadError::Server { .. } => "SERVER_ERROR",
            UploadError::Cancelled => "CANCELLED",
            UploadError::Config(_) => "CONFIG_ERROR",
            UploadError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            UploadError::Network(_) | UploadError::Timeout(_) => true,
            UploadError::Server { status, .. } => Self::is_retryable_status(*status),
            _ => false,
        }
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::Validation(msg) => msg.clone(),
            UploadError::Duplicate(_) => "This file is already being uploaded".to_string(),
            UploadError::Compression(_) => "Could not compress the file".to_string(),
            UploadError::Network(_) => {
                "Network connection lost. Check your connection and retry".to_string()
            }
            UploadError::Timeout(_) => "The upload took too long. Please retry".to_string(),
            UploadError::Server { message, .. } => format!("Upload rejected: {}", message),
            UploadError::Cancelled => "Upload cancelled".to_string(),
            UploadError::Config(_) | UploadError::Internal(_) => {
                "Upload failed due to an internal error".to_string()
            }
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            UploadError::Validation(_) | UploadError::Duplicate(_) | UploadError::Cancelled => {
                LogLevel::Debug
            }
            UploadError::Compression(_) | UploadError::Network(_) | UploadError::Timeout(_) => {
                LogLevel::Warn
            }
            UploadError::Server { status, .. } if Self::is_retryable_status(*status) => {
                LogLevel::Warn
            }
            _ => LogLevel::Error,
        }
    }
}
