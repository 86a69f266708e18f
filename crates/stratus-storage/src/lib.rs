//! Stratus Storage Library
//!
//! This crate provides the storage client facade: a registry of per-application
//! storage services, references into a bucket, and transfer tasks with
//! observable progress and a single settlement outcome.
//!
//! # Services
//!
//! [`StorageRegistry::get_service`] returns the one [`StorageService`] for an
//! (application, bucket) pair, creating it on first use. Repeated lookups
//! return the same instance, so retry-time changes made through one handle are
//! visible through every other.
//!
//! # Transfers
//!
//! Uploads and downloads run as [`TransferTask`]s driven on the tokio runtime.
//! A task emits [`TaskSnapshot`]s while it runs and settles exactly once; await
//! the task for the final snapshot or take its progress stream for every
//! intermediate one.
//!
//! The bytes themselves move through a [`Transport`] implementation supplied by
//! the caller.

#[cfg(feature = "transport-memory")]
pub mod memory;
pub mod reference;
pub mod registry;
pub(crate) mod retry;
pub mod service;
pub mod task;
pub mod transport;

// Re-export commonly used types
#[cfg(feature = "transport-memory")]
pub use memory::MemoryTransport;
pub use reference::StorageReference;
pub use registry::StorageRegistry;
pub use service::StorageService;
pub use stratus_core::{
    AppContext, AppIdentity, AppLifecycleListener, AppOptions, BucketAddress, FullMetadata,
    RetryCategory, RetryTime, SettableMetadata, StorageConfig, StorageError, StorageResult,
    StringFormat, TaskKind, TaskSnapshot, TaskState, TransferError,
};
pub use task::{ProgressReporter, SnapshotStream, TaskHandle, TransferTask};
pub use transport::{
    DownloadDestination, DownloadRequest, DownloadResult, ObjectLocation, Transport, UploadRequest,
};
