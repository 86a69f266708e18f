//! Error types module
//!
//! Validation failures (`InvalidBucketAddress`, `InvalidArgument`, `InvalidPath`)
//! are returned synchronously and never mutate state. Transport failures are
//! wrapped in [`TransferError`] and only surface through a task's outcome or an
//! operation's result once the retry budget is spent.

use thiserror::Error;

/// A failure reported by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransferError {
    message: String,
    transient: bool,
    status: Option<u16>,
}

impl TransferError {
    /// A failure worth retrying (network blip, throttling, server error).
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
            status: None,
        }
    }

    /// A failure that will not go away by retrying.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
            status: None,
        }
    }

    /// Classify a backend status code. 408, 429 and 5xx are transient.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: is_transient_status(status),
            status: Some(status),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Invalid bucket address: {0}")]
    InvalidBucketAddress(String),

    #[error("No default bucket configured for app '{0}'")]
    NoDefaultBucket(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Retry limit exceeded after {elapsed_ms}ms: {source}")]
    RetryLimitExceeded {
        elapsed_ms: u64,
        #[source]
        source: TransferError,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::InvalidBucketAddress(_) => "INVALID_BUCKET_ADDRESS",
            StorageError::NoDefaultBucket(_) => "NO_DEFAULT_BUCKET",
            StorageError::InvalidArgument(_) => "INVALID_ARGUMENT",
            StorageError::InvalidPath(_) => "INVALID_PATH",
            StorageError::Transfer(_) => "TRANSFER_ERROR",
            StorageError::RetryLimitExceeded { .. } => "RETRY_LIMIT_EXCEEDED",
            StorageError::Cancelled => "CANCELLED",
            StorageError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the caller may reasonably start the operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Transfer(err) => err.is_transient(),
            StorageError::RetryLimitExceeded { .. } => true,
            StorageError::InvalidBucketAddress(_)
            | StorageError::NoDefaultBucket(_)
            | StorageError::InvalidArgument(_)
            | StorageError::InvalidPath(_)
            | StorageError::Cancelled
            | StorageError::Config(_) => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StorageError::Cancelled)
    }

    /// The transport failure behind this error, if any.
    pub fn transfer_error(&self) -> Option<&TransferError> {
        match self {
            StorageError::Transfer(err) => Some(err),
            StorageError::RetryLimitExceeded { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(TransferError::from_status(503, "unavailable").is_transient());
        assert!(TransferError::from_status(500, "boom").is_transient());
        assert!(TransferError::from_status(429, "slow down").is_transient());
        assert!(TransferError::from_status(408, "timeout").is_transient());
        assert!(!TransferError::from_status(404, "missing").is_transient());
        assert!(!TransferError::from_status(403, "denied").is_transient());
        assert_eq!(TransferError::from_status(404, "missing").status(), Some(404));
    }

    #[test]
    fn retry_limit_keeps_last_failure() {
        let err = StorageError::RetryLimitExceeded {
            elapsed_ms: 1500,
            source: TransferError::transient("connection reset"),
        };
        assert_eq!(err.error_code(), "RETRY_LIMIT_EXCEEDED");
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(
            err.transfer_error().map(TransferError::message),
            Some("connection reset")
        );
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        assert!(!StorageError::InvalidArgument("x".into()).is_retryable());
        assert!(!StorageError::InvalidBucketAddress("x".into()).is_retryable());
        assert!(!StorageError::Cancelled.is_retryable());
        assert!(StorageError::Cancelled.is_cancelled());
    }

    #[test]
    fn transfer_error_converts() {
        let err: StorageError = TransferError::fatal("denied").into();
        assert_eq!(err.error_code(), "TRANSFER_ERROR");
        assert!(!err.is_retryable());
    }
}
