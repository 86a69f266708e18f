//! Transport abstraction trait
//!
//! The transport moves bytes to and from the backend. It is supplied by the
//! caller (credentials, wire protocol and connection handling all live behind
//! it) and reports progress through the [`ProgressReporter`] it is handed.
//!
//! Implementations classify their failures: a [`TransferError`] marked
//! transient is retried within the applicable retry-time ceiling, anything
//! else settles the task immediately.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use stratus_core::{BucketAddress, FullMetadata, SettableMetadata, TransferError};

use crate::task::ProgressReporter;

/// An object inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: BucketAddress,
    pub path: String,
}

impl Display for ObjectLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.bucket, self.path)
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub location: ObjectLocation,
    pub data: Bytes,
    pub metadata: SettableMetadata,
}

/// Where downloaded bytes end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadDestination {
    /// Return the bytes in [`DownloadResult::data`].
    Memory,
    /// Write the bytes to a local file, replacing it.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub location: ObjectLocation,
    pub destination: DownloadDestination,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub bytes_written: u64,
    /// Present for [`DownloadDestination::Memory`].
    pub data: Option<Bytes>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Upload `request.data`, reporting bytes as they are sent.
    ///
    /// Returns the metadata the backend stored for the object.
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> Result<FullMetadata, TransferError>;

    /// Download an object. Implementations should call
    /// [`ProgressReporter::set_total`] as soon as the object size is known.
    async fn download(
        &self,
        request: DownloadRequest,
        progress: ProgressReporter,
    ) -> Result<DownloadResult, TransferError>;

    async fn get_metadata(&self, location: &ObjectLocation) -> Result<FullMetadata, TransferError>;

    async fn update_metadata(
        &self,
        location: &ObjectLocation,
        metadata: &SettableMetadata,
    ) -> Result<FullMetadata, TransferError>;

    async fn delete(&self, location: &ObjectLocation) -> Result<(), TransferError>;

    /// A long-lived URL serving the object's bytes.
    async fn download_url(&self, location: &ObjectLocation) -> Result<String, TransferError>;
}
