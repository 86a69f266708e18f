use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use stratus_core::constants::BUCKET_SCHEME;
use stratus_core::{
    AppContext, BucketAddress, RetryCategory, RetryTime, StorageConfig, StorageError,
    StorageResult,
};

use crate::reference::StorageReference;
use crate::retry::{BackoffPolicy, RetryPolicy};
use crate::transport::Transport;

/// Storage facade for one (application, bucket) pair.
///
/// Cloning is cheap and every clone refers to the same instance: retry-time
/// changes made through one clone are seen by all of them.
#[derive(Clone)]
pub struct StorageService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    app: AppContext,
    bucket: BucketAddress,
    storage_domain: String,
    transport: Arc<dyn Transport>,
    max_operation_retry_time_ms: AtomicU64,
    max_upload_retry_time_ms: AtomicU64,
    max_download_retry_time_ms: AtomicU64,
    backoff: BackoffPolicy,
}

impl StorageService {
    pub(crate) fn new(
        app: AppContext,
        bucket: BucketAddress,
        transport: Arc<dyn Transport>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                app,
                bucket,
                storage_domain: config.storage_domain.clone(),
                transport,
                max_operation_retry_time_ms: AtomicU64::new(config.max_operation_retry_time_ms),
                max_upload_retry_time_ms: AtomicU64::new(config.max_upload_retry_time_ms),
                max_download_retry_time_ms: AtomicU64::new(config.max_download_retry_time_ms),
                backoff: BackoffPolicy::from_config(config),
            }),
        }
    }

    pub fn app(&self) -> &AppContext {
        &self.inner.app
    }

    pub fn bucket(&self) -> &BucketAddress {
        &self.inner.bucket
    }

    /// Whether both handles refer to the same service instance.
    pub fn ptr_eq(&self, other: &StorageService) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A reference to `path` inside this service's bucket.
    pub fn reference(&self, path: &str) -> StorageResult<StorageReference> {
        StorageReference::new(self.clone(), path)
    }

    /// A reference to the bucket root.
    pub fn root(&self) -> StorageReference {
        StorageReference::root_of(self.clone())
    }

    /// A reference from a full `gs://bucket/path` URL.
    ///
    /// The URL must name this service's bucket.
    pub fn reference_from_url(&self, url: &str) -> StorageResult<StorageReference> {
        let rest = url.strip_prefix(BUCKET_SCHEME).ok_or_else(|| {
            StorageError::InvalidArgument(format!(
                "reference url must begin with '{}', got '{}'",
                BUCKET_SCHEME, url
            ))
        })?;
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));

        let bucket = BucketAddress::parse_with_domain(
            &format!("{}{}", BUCKET_SCHEME, host),
            &self.inner.storage_domain,
        )?;
        if bucket != self.inner.bucket {
            return Err(StorageError::InvalidArgument(format!(
                "reference url '{}' is not in bucket '{}'",
                url, self.inner.bucket
            )));
        }

        self.reference(path)
    }

    fn retry_slot(&self, category: RetryCategory) -> &AtomicU64 {
        match category {
            RetryCategory::Operation => &self.inner.max_operation_retry_time_ms,
            RetryCategory::Upload => &self.inner.max_upload_retry_time_ms,
            RetryCategory::Download => &self.inner.max_download_retry_time_ms,
        }
    }

    /// Current ceiling for `category`.
    pub fn retry_time(&self, category: RetryCategory) -> RetryTime {
        RetryTime::from_millis(self.retry_slot(category).load(Ordering::Relaxed))
    }

    /// Replace the ceiling for `category`. Invalid input leaves it unchanged.
    pub fn set_retry_time<T>(&self, category: RetryCategory, time: T) -> StorageResult<()>
    where
        T: TryInto<RetryTime, Error = StorageError>,
    {
        let time = time.try_into()?;
        self.retry_slot(category)
            .store(time.as_millis(), Ordering::Relaxed);
        tracing::debug!(
            app = %self.inner.app.identity(),
            bucket = %self.inner.bucket,
            category = %category,
            time_ms = time.as_millis(),
            "Retry time updated"
        );
        Ok(())
    }

    pub fn max_operation_retry_time(&self) -> RetryTime {
        self.retry_time(RetryCategory::Operation)
    }

    pub fn max_upload_retry_time(&self) -> RetryTime {
        self.retry_time(RetryCategory::Upload)
    }

    pub fn max_download_retry_time(&self) -> RetryTime {
        self.retry_time(RetryCategory::Download)
    }

    pub fn set_max_operation_retry_time<T>(&self, time: T) -> StorageResult<()>
    where
        T: TryInto<RetryTime, Error = StorageError>,
    {
        self.set_retry_time(RetryCategory::Operation, time)
    }

    pub fn set_max_upload_retry_time<T>(&self, time: T) -> StorageResult<()>
    where
        T: TryInto<RetryTime, Error = StorageError>,
    {
        self.set_retry_time(RetryCategory::Upload, time)
    }

    pub fn set_max_download_retry_time<T>(&self, time: T) -> StorageResult<()>
    where
        T: TryInto<RetryTime, Error = StorageError>,
    {
        self.set_retry_time(RetryCategory::Download, time)
    }

    /// Retry budget for an operation starting now.
    pub(crate) fn retry_policy(&self, category: RetryCategory) -> RetryPolicy {
        RetryPolicy {
            ceiling: self.retry_time(category).as_duration(),
            backoff: self.inner.backoff,
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("app", self.inner.app.identity())
            .field("bucket", &self.inner.bucket)
            .field("max_operation_retry_time", &self.max_operation_retry_time())
            .field("max_upload_retry_time", &self.max_upload_retry_time())
            .field("max_download_retry_time", &self.max_download_retry_time())
            .finish()
    }
}
