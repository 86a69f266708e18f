//! Service registry
//!
//! Holds at most one [`StorageService`] per (application, bucket) pair. The map
//! is split into shards selected by a hash of the application identity, so all
//! services of one app live in the same shard and lookups for different apps
//! rarely contend.

use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use stratus_core::{
    AppContext, AppIdentity, AppLifecycleListener, BucketAddress, StorageConfig, StorageResult,
};

use crate::service::StorageService;
use crate::transport::Transport;

type ServiceKey = (AppIdentity, BucketAddress);
type Shard = RwLock<HashMap<ServiceKey, StorageService>>;

/// Registry of storage services keyed by application and bucket.
pub struct StorageRegistry {
    shards: Vec<Shard>,
    transport: Arc<dyn Transport>,
    config: StorageConfig,
}

impl StorageRegistry {
    /// Create an empty registry. Services it creates share `transport` and take
    /// their initial retry times from `config`.
    pub fn new(transport: Arc<dyn Transport>, config: StorageConfig) -> Self {
        let shard_count = config.registry_shards.max(1);
        let shards = (0..shard_count)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        Self {
            shards,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn shard(&self, identity: &AppIdentity) -> &Shard {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    fn read(shard: &Shard) -> RwLockReadGuard<'_, HashMap<ServiceKey, StorageService>> {
        shard.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(shard: &Shard) -> RwLockWriteGuard<'_, HashMap<ServiceKey, StorageService>> {
        shard.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The service for `app` and `bucket`, created on first use.
    ///
    /// `bucket` defaults to the app's configured bucket. An invalid bucket URL
    /// fails before anything is created. An existing service is returned
    /// as-is, keeping any retry times set on it.
    #[tracing::instrument(skip(self, app), fields(app = %app.identity()))]
    pub fn get_service(
        &self,
        app: &AppContext,
        bucket: Option<&str>,
    ) -> StorageResult<StorageService> {
        let bucket = app.resolve_bucket(bucket, &self.config.storage_domain)?;
        let key = (app.identity().clone(), bucket);
        let shard = self.shard(app.identity());

        if let Some(service) = Self::read(shard).get(&key) {
            return Ok(service.clone());
        }

        let mut services = Self::write(shard);
        let service = match services.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (identity, bucket) = entry.key().clone();
                let service = StorageService::new(
                    app.clone(),
                    bucket.clone(),
                    self.transport.clone(),
                    &self.config,
                );
                tracing::info!(
                    app = %identity,
                    bucket = %bucket,
                    "Storage service created"
                );
                entry.insert(service).clone()
            }
        };

        Ok(service)
    }

    /// Drop every service owned by `identity`. Returns how many were removed.
    pub fn release_app(&self, identity: &AppIdentity) -> usize {
        let mut services = Self::write(self.shard(identity));
        let before = services.len();
        services.retain(|(owner, _), _| owner != identity);
        let released = before - services.len();

        if released > 0 {
            tracing::info!(app = %identity, released, "Storage services released");
        }
        released
    }

    pub fn contains(&self, identity: &AppIdentity, bucket: &BucketAddress) -> bool {
        Self::read(self.shard(identity)).contains_key(&(identity.clone(), bucket.clone()))
    }

    /// Services currently registered for `identity`, ordered by bucket.
    pub fn services_for(&self, identity: &AppIdentity) -> Vec<StorageService> {
        let mut services: Vec<StorageService> = Self::read(self.shard(identity))
            .iter()
            .filter(|((owner, _), _)| owner == identity)
            .map(|(_, service)| service.clone())
            .collect();
        services.sort_by(|a, b| a.bucket().cmp(b.bucket()));
        services
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| Self::read(shard).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AppLifecycleListener for StorageRegistry {
    fn on_app_deleted(&self, identity: &AppIdentity) {
        self.release_app(identity);
    }
}

impl std::fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageRegistry")
            .field("shards", &self.shards.len())
            .field("services", &self.len())
            .finish()
    }
}
