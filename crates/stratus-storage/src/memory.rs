//! In-memory transport
//!
//! Keeps objects in a process-local map and moves bytes in fixed-size chunks,
//! reporting progress and honouring pause between chunks. Faults can be queued
//! to exercise retry behaviour.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use stratus_core::constants::{DEFAULT_CONTENT_TYPE, DEFAULT_HOST};
use stratus_core::{FullMetadata, SettableMetadata, TransferError};

use crate::task::ProgressReporter;
use crate::transport::{
    DownloadDestination, DownloadRequest, DownloadResult, ObjectLocation, Transport, UploadRequest,
};

const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

struct StoredObject {
    data: Bytes,
    metadata: FullMetadata,
    download_token: Uuid,
}

/// A [`Transport`] backed by memory.
pub struct MemoryTransport {
    objects: Mutex<HashMap<ObjectLocation, StoredObject>>,
    faults: Mutex<VecDeque<TransferError>>,
    persistent_fault: Mutex<Option<TransferError>>,
    chunk_size: usize,
    chunk_delay: Duration,
    host: String,
    attempts: AtomicU64,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(location: &ObjectLocation) -> TransferError {
    TransferError::from_status(404, format!("object '{}' does not exist", location))
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            faults: Mutex::new(VecDeque::new()),
            persistent_fault: Mutex::new(None),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: Duration::ZERO,
            host: DEFAULT_HOST.to_string(),
            attempts: AtomicU64::new(0),
        }
    }

    /// Bytes moved per progress report. Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Simulated latency per chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Host used in download URLs.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Fail the next call with `error`. Transfers fail after their first chunk.
    pub fn inject_fault(&self, error: TransferError) {
        lock(&self.faults).push_back(error);
    }

    /// Fail every call with `error` until cleared with `None`.
    pub fn set_persistent_fault(&self, error: Option<TransferError>) {
        *lock(&self.persistent_fault) = error;
    }

    /// Number of transport calls made so far, including failed ones.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn object(&self, location: &ObjectLocation) -> Option<Bytes> {
        lock(&self.objects)
            .get(location)
            .map(|object| object.data.clone())
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store an object directly, bypassing progress and faults.
    pub fn insert_object(
        &self,
        location: ObjectLocation,
        data: impl Into<Bytes>,
        metadata: SettableMetadata,
    ) -> FullMetadata {
        self.store(location, data.into(), metadata)
    }

    fn store(
        &self,
        location: ObjectLocation,
        data: Bytes,
        settable: SettableMetadata,
    ) -> FullMetadata {
        let now = Utc::now();
        let mut settable = settable;
        if settable.content_type.is_none() {
            settable.content_type = Some(DEFAULT_CONTENT_TYPE.to_string());
        }

        let metadata = FullMetadata {
            bucket: location.bucket.bucket_name().to_string(),
            full_path: location.path.clone(),
            name: location
                .path
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
            size: data.len() as u64,
            generation: now.timestamp_micros().to_string(),
            metageneration: "1".to_string(),
            time_created: now,
            updated: now,
            md5_hash: None,
            settable,
        };

        lock(&self.objects).insert(
            location,
            StoredObject {
                data,
                metadata: metadata.clone(),
                download_token: Uuid::new_v4(),
            },
        );
        metadata
    }

    fn begin_call(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }

    fn next_fault(&self) -> Option<TransferError> {
        if let Some(fault) = lock(&self.faults).pop_front() {
            return Some(fault);
        }
        lock(&self.persistent_fault).clone()
    }

    fn check_fault(&self) -> Result<(), TransferError> {
        match self.next_fault() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Move `total` bytes in chunks, honouring pause and reporting progress.
    async fn stream_chunks(
        &self,
        total: u64,
        progress: &ProgressReporter,
    ) -> Result<(), TransferError> {
        let mut sent: u64 = 0;
        let mut first = true;

        loop {
            if !progress.ready().await {
                return Err(TransferError::fatal("transfer abandoned"));
            }

            let chunk = (self.chunk_size as u64).min(total - sent);
            if !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
            sent += chunk;
            if !progress.report(chunk) {
                return Err(TransferError::fatal("transfer abandoned"));
            }

            if first {
                first = false;
                self.check_fault()?;
            }
            if sent >= total {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> Result<FullMetadata, TransferError> {
        self.begin_call();
        let total = request.data.len() as u64;
        self.stream_chunks(total, &progress).await?;

        let metadata = self.store(request.location, request.data, request.metadata);
        tracing::debug!(
            bucket = %metadata.bucket,
            path = %metadata.full_path,
            size = metadata.size,
            "Object stored in memory"
        );
        Ok(metadata)
    }

    async fn download(
        &self,
        request: DownloadRequest,
        progress: ProgressReporter,
    ) -> Result<DownloadResult, TransferError> {
        self.begin_call();
        let data = self
            .object(&request.location)
            .ok_or_else(|| not_found(&request.location))?;
        let total = data.len() as u64;
        progress.set_total(total);
        self.stream_chunks(total, &progress).await?;

        match request.destination {
            DownloadDestination::Memory => Ok(DownloadResult {
                bytes_written: total,
                data: Some(data),
            }),
            DownloadDestination::File(path) => {
                tokio::fs::write(&path, &data).await.map_err(|e| {
                    TransferError::fatal(format!("failed to write {}: {}", path.display(), e))
                })?;
                Ok(DownloadResult {
                    bytes_written: total,
                    data: None,
                })
            }
        }
    }

    async fn get_metadata(&self, location: &ObjectLocation) -> Result<FullMetadata, TransferError> {
        self.begin_call();
        self.check_fault()?;
        lock(&self.objects)
            .get(location)
            .map(|object| object.metadata.clone())
            .ok_or_else(|| not_found(location))
    }

    async fn update_metadata(
        &self,
        location: &ObjectLocation,
        metadata: &SettableMetadata,
    ) -> Result<FullMetadata, TransferError> {
        self.begin_call();
        self.check_fault()?;
        let mut objects = lock(&self.objects);
        let object = objects.get_mut(location).ok_or_else(|| not_found(location))?;

        object.metadata.settable.merge(metadata);
        let metageneration = object
            .metadata
            .metageneration
            .parse::<u64>()
            .unwrap_or(1)
            + 1;
        object.metadata.metageneration = metageneration.to_string();
        object.metadata.updated = Utc::now();
        Ok(object.metadata.clone())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<(), TransferError> {
        self.begin_call();
        self.check_fault()?;
        lock(&self.objects)
            .remove(location)
            .map(|_| ())
            .ok_or_else(|| not_found(location))
    }

    async fn download_url(&self, location: &ObjectLocation) -> Result<String, TransferError> {
        self.begin_call();
        self.check_fault()?;
        let token = lock(&self.objects)
            .get(location)
            .map(|object| object.download_token)
            .ok_or_else(|| not_found(location))?;

        Ok(format!(
            "https://{}/v0/b/{}/o/{}?alt=media&token={}",
            self.host,
            location.bucket.bucket_name(),
            utf8_percent_encode(&location.path, NON_ALPHANUMERIC),
            token
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::BucketAddress;

    fn location(path: &str) -> ObjectLocation {
        ObjectLocation {
            bucket: BucketAddress::parse("gs://photos").unwrap(),
            path: path.to_string(),
        }
    }

    #[tokio::test]
    async fn metadata_operations() {
        let transport = MemoryTransport::new();
        let cat = location("cats/tabby.png");
        let stored =
            transport.insert_object(cat.clone(), &b"meow"[..], SettableMetadata::default());
        assert_eq!(stored.content_type(), Some(DEFAULT_CONTENT_TYPE));
        assert_eq!(stored.name, "tabby.png");
        assert_eq!(stored.bucket, "photos.appspot.com");

        let updated = transport
            .update_metadata(&cat, &SettableMetadata::with_content_type("image/png"))
            .await
            .unwrap();
        assert_eq!(updated.content_type(), Some("image/png"));
        assert_eq!(updated.metageneration, "2");
        assert_eq!(transport.get_metadata(&cat).await.unwrap(), updated);

        transport.delete(&cat).await.unwrap();
        let err = transport.delete(&cat).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(transport.is_empty());
    }

    #[tokio::test]
    async fn download_url_encodes_path() {
        let transport = MemoryTransport::new().with_host("storage.test");
        let cat = location("cats/tabby cat.png");
        transport.insert_object(cat.clone(), &b"meow"[..], SettableMetadata::default());

        let url = transport.download_url(&cat).await.unwrap();
        assert!(url.starts_with(
            "https://storage.test/v0/b/photos.appspot.com/o/cats%2Ftabby%20cat%2Epng?alt=media&token="
        ));
    }

    #[tokio::test]
    async fn queued_faults_fire_once() {
        let transport = MemoryTransport::new();
        let cat = location("cat.png");
        transport.insert_object(cat.clone(), &b"meow"[..], SettableMetadata::default());
        transport.inject_fault(TransferError::from_status(503, "unavailable"));

        assert!(transport.get_metadata(&cat).await.unwrap_err().is_transient());
        assert!(transport.get_metadata(&cat).await.is_ok());
        assert_eq!(transport.attempts(), 2);
    }
}
