use crux_core::UploadError;
use std::time::Duration;
use thiserror::Error;

/// Transfer operation errors
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success status, or a success status whose body says `success: false`.
    #[error("Server rejected request (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Malformed response: {0}")]
    InvalidResponse(String),

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;

impl TransferError {
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            TransferError::Timeout(timeout)
        } else {
            TransferError::Network(err.to_string())
        }
    }
}

impl From<TransferError> for UploadError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Network(msg) => UploadError::Network(msg),
            // A garbled body usually means a proxy cut the response short
            TransferError::InvalidResponse(msg) => UploadError::Network(msg),
            TransferError::Timeout(after) => UploadError::Timeout(after),
            TransferError::Server { status, message } => UploadError::Server { status, message },
            TransferError::Cancelled => UploadError::Cancelled,
            TransferError::Config(msg) => UploadError::Config(msg),
        }
    }
}
