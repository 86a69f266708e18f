//! Stratus Core Library
//!
//! This crate provides the domain types shared by every Stratus component:
//! bucket addressing, application identity, transfer task models, retry-time
//! values, configuration and the error types.

pub mod app;
pub mod bucket;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod retry_time;

// Re-export commonly used types
pub use app::{AppContext, AppIdentity, AppLifecycleListener, AppOptions};
pub use bucket::BucketAddress;
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult, TransferError};
pub use models::{
    DecodedString, FullMetadata, SettableMetadata, StringFormat, TaskKind, TaskSnapshot,
    TaskState,
};
pub use retry_time::{RetryCategory, RetryTime};
