//! Error response serialization
//!
//! Reporting surfaces (the CLI, log sinks) render a [`StorageError`] as an
//! [`ErrorResponse`] so callers get a stable machine-readable shape.

use serde::Serialize;
use std::error::Error as _;
use stratus_core::StorageError;

/// Standard error response format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub error_type: String,
    pub retryable: bool,
}

impl From<&StorageError> for ErrorResponse {
    fn from(err: &StorageError) -> Self {
        Self {
            error: err.to_string(),
            details: err.source().map(|source| source.to_string()),
            error_type: err.error_code().to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<StorageError> for ErrorResponse {
    fn from(err: StorageError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::TransferError;

    #[test]
    fn serializes_validation_error() {
        let response = ErrorResponse::from(StorageError::InvalidBucketAddress(
            "bucket url must be a string and begin with 'gs://', got 'photos'".to_string(),
        ));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error_type"], "INVALID_BUCKET_ADDRESS");
        assert_eq!(json["retryable"], false);
        assert!(json.get("details").is_none());
    }

    #[test]
    fn includes_transfer_cause() {
        let response = ErrorResponse::from(&StorageError::RetryLimitExceeded {
            elapsed_ms: 5000,
            source: TransferError::from_status(503, "unavailable"),
        });
        assert_eq!(response.error_type, "RETRY_LIMIT_EXCEEDED");
        assert_eq!(response.details.as_deref(), Some("unavailable"));
        assert!(response.retryable);
    }
}
