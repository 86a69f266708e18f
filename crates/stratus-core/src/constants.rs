//! Constants shared across Stratus crates.

/// Scheme every bucket URL must start with.
pub const BUCKET_SCHEME: &str = "gs://";

/// Domain appended to bucket names that carry no domain suffix.
pub const DEFAULT_STORAGE_DOMAIN: &str = "appspot.com";

/// Host serving download URLs.
pub const DEFAULT_HOST: &str = "firebasestorage.googleapis.com";

/// Name of the implicitly configured application.
pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";

pub const DEFAULT_MAX_OPERATION_RETRY_TIME_MS: u64 = 2 * 60 * 1_000;

pub const DEFAULT_MAX_UPLOAD_RETRY_TIME_MS: u64 = 10 * 60 * 1_000;

pub const DEFAULT_MAX_DOWNLOAD_RETRY_TIME_MS: u64 = 10 * 60 * 1_000;

/// First retry delay; doubled on every further attempt.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;

/// Upper bound for a single retry delay.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 64_000;

pub const DEFAULT_REGISTRY_SHARDS: usize = 16;

/// Object names are limited to 1024 bytes of UTF-8.
pub const MAX_OBJECT_PATH_BYTES: usize = 1024;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
