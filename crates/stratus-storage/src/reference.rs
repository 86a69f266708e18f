//! References into a bucket
//!
//! A [`StorageReference`] names an object path inside its service's bucket. It
//! starts transfers (returned as [`TransferTask`]s) and runs single-shot object
//! operations bounded by the service's operation retry time.

use bytes::Bytes;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use stratus_core::constants::MAX_OBJECT_PATH_BYTES;
use stratus_core::{
    BucketAddress, FullMetadata, RetryCategory, SettableMetadata, StorageError, StorageResult,
    StringFormat, TaskKind, TransferError,
};

use crate::retry::retry_operation;
use crate::service::StorageService;
use crate::task::{spawn_transfer, Completed, TransferTask};
use crate::transport::{DownloadDestination, DownloadRequest, ObjectLocation, UploadRequest};

#[derive(Clone)]
pub struct StorageReference {
    service: StorageService,
    path: String,
}

/// Strip leading, trailing and repeated separators.
fn normalize_path(path: &str) -> StorageResult<String> {
    let normalized = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if normalized.len() > MAX_OBJECT_PATH_BYTES {
        return Err(StorageError::InvalidPath(format!(
            "object path is {} bytes, the limit is {}",
            normalized.len(),
            MAX_OBJECT_PATH_BYTES
        )));
    }
    Ok(normalized)
}

impl StorageReference {
    pub(crate) fn new(service: StorageService, path: &str) -> StorageResult<Self> {
        Ok(Self {
            service,
            path: normalize_path(path)?,
        })
    }

    pub(crate) fn root_of(service: StorageService) -> Self {
        Self {
            service,
            path: String::new(),
        }
    }

    pub fn service(&self) -> &StorageService {
        &self.service
    }

    pub fn bucket(&self) -> &BucketAddress {
        self.service.bucket()
    }

    /// Path inside the bucket, without a leading `/`. Empty for the root.
    pub fn full_path(&self) -> &str {
        &self.path
    }

    /// Last path segment. Empty for the root.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn child(&self, path: &str) -> StorageResult<StorageReference> {
        Self::new(self.service.clone(), &format!("{}/{}", self.path, path))
    }

    /// The enclosing reference, or `None` at the root.
    pub fn parent(&self) -> Option<StorageReference> {
        if self.is_root() {
            return None;
        }
        let parent = self
            .path
            .rsplit_once('/')
            .map(|(parent, _)| parent.to_string())
            .unwrap_or_default();
        Some(Self {
            service: self.service.clone(),
            path: parent,
        })
    }

    pub fn root(&self) -> StorageReference {
        Self::root_of(self.service.clone())
    }

    pub fn location(&self) -> ObjectLocation {
        ObjectLocation {
            bucket: self.service.bucket().clone(),
            path: self.path.clone(),
        }
    }

    fn object_location(&self, operation: &str) -> StorageResult<ObjectLocation> {
        if self.is_root() {
            return Err(StorageError::InvalidPath(format!(
                "{} requires an object path, not the bucket root",
                operation
            )));
        }
        Ok(self.location())
    }

    /// Upload `data` as this object.
    ///
    /// Validation errors are returned here; transfer failures settle the task.
    pub fn put(
        &self,
        data: impl Into<Bytes>,
        metadata: SettableMetadata,
    ) -> StorageResult<TransferTask> {
        let location = self.object_location("put")?;
        let data = data.into();
        let total_bytes = data.len() as u64;
        let transport = self.service.transport().clone();

        tracing::debug!(
            bucket = %location.bucket,
            path = %location.path,
            bytes = total_bytes,
            "Starting upload"
        );

        spawn_transfer(
            TaskKind::Upload,
            location.path.clone(),
            Some(total_bytes),
            self.service.retry_policy(RetryCategory::Upload),
            move |progress| {
                let transport = transport.clone();
                let request = UploadRequest {
                    location: location.clone(),
                    data: data.clone(),
                    metadata: metadata.clone(),
                };
                async move {
                    let metadata = transport.upload(request, progress).await?;
                    Ok(Completed {
                        total_bytes,
                        metadata: Some(metadata),
                    })
                }
            },
        )
    }

    /// Upload a string decoded according to `format`.
    ///
    /// A data URL's media type is used as the content type unless `metadata`
    /// sets one.
    pub fn put_string(
        &self,
        data: &str,
        format: StringFormat,
        metadata: SettableMetadata,
    ) -> StorageResult<TransferTask> {
        self.object_location("put_string")?;
        let decoded = format.decode(data)?;

        let mut metadata = metadata;
        if metadata.content_type.is_none() {
            metadata.content_type = decoded.content_type;
        }
        self.put(decoded.bytes, metadata)
    }

    /// Download this object into a local file, replacing it.
    pub fn write_to_file(&self, file: impl Into<PathBuf>) -> StorageResult<TransferTask> {
        let location = self.object_location("write_to_file")?;
        let file = file.into();
        let transport = self.service.transport().clone();

        tracing::debug!(
            bucket = %location.bucket,
            path = %location.path,
            file = %file.display(),
            "Starting download to file"
        );

        spawn_transfer(
            TaskKind::Download,
            location.path.clone(),
            None,
            self.service.retry_policy(RetryCategory::Download),
            move |progress| {
                let transport = transport.clone();
                let request = DownloadRequest {
                    location: location.clone(),
                    destination: DownloadDestination::File(file.clone()),
                };
                async move {
                    let result = transport.download(request, progress).await?;
                    Ok(Completed {
                        total_bytes: result.bytes_written,
                        metadata: None,
                    })
                }
            },
        )
    }

    /// Download this object into memory.
    pub async fn get_bytes(&self) -> StorageResult<Bytes> {
        let location = self.object_location("get_bytes")?;
        let transport = self.service.transport().clone();
        let slot: Arc<Mutex<Option<Bytes>>> = Arc::new(Mutex::new(None));
        let attempt_slot = slot.clone();

        let task = spawn_transfer(
            TaskKind::Download,
            location.path.clone(),
            None,
            self.service.retry_policy(RetryCategory::Download),
            move |progress| {
                let transport = transport.clone();
                let slot = attempt_slot.clone();
                let request = DownloadRequest {
                    location: location.clone(),
                    destination: DownloadDestination::Memory,
                };
                async move {
                    let result = transport.download(request, progress).await?;
                    let data = result.data.ok_or_else(|| {
                        TransferError::fatal("transport returned no data for an in-memory download")
                    })?;
                    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
                    Ok(Completed {
                        total_bytes: result.bytes_written,
                        metadata: None,
                    })
                }
            },
        )?;

        task.await?;
        let data = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(data.unwrap_or_default())
    }

    pub async fn get_metadata(&self) -> StorageResult<FullMetadata> {
        let location = self.object_location("get_metadata")?;
        let transport = self.service.transport();
        retry_operation(
            &self.service.retry_policy(RetryCategory::Operation),
            "get_metadata",
            &self.to_string(),
            || transport.get_metadata(&location),
        )
        .await
    }

    /// Apply the fields set in `metadata`, returning the stored result.
    pub async fn update_metadata(
        &self,
        metadata: &SettableMetadata,
    ) -> StorageResult<FullMetadata> {
        let location = self.object_location("update_metadata")?;
        let transport = self.service.transport();
        retry_operation(
            &self.service.retry_policy(RetryCategory::Operation),
            "update_metadata",
            &self.to_string(),
            || transport.update_metadata(&location, metadata),
        )
        .await
    }

    pub async fn delete(&self) -> StorageResult<()> {
        let location = self.object_location("delete")?;
        let transport = self.service.transport();
        retry_operation(
            &self.service.retry_policy(RetryCategory::Operation),
            "delete",
            &self.to_string(),
            || transport.delete(&location),
        )
        .await?;
        tracing::info!(bucket = %location.bucket, path = %location.path, "Object deleted");
        Ok(())
    }

    pub async fn get_download_url(&self) -> StorageResult<String> {
        let location = self.object_location("get_download_url")?;
        let transport = self.service.transport();
        retry_operation(
            &self.service.retry_policy(RetryCategory::Operation),
            "get_download_url",
            &self.to_string(),
            || transport.download_url(&location),
        )
        .await
    }
}

impl Display for StorageReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.service.bucket(), self.path)
    }
}

impl std::fmt::Debug for StorageReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StorageReference")
            .field("bucket", self.service.bucket())
            .field("path", &self.path)
            .finish()
    }
}
