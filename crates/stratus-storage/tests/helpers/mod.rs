pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;
use stratus_storage::{
    AppContext, AppIdentity, AppOptions, MemoryTransport, StorageConfig, StorageRegistry,
    StorageService,
};

/// Bucket configured for the default test app.
pub const DEFAULT_BUCKET: &str = "react-native-firebase-testing.appspot.com";

/// Test storage setup
pub struct TestStorage {
    pub registry: StorageRegistry,
    pub transport: Arc<MemoryTransport>,
}

impl TestStorage {
    /// Service for the default app's default bucket.
    pub fn default_service(&self) -> StorageService {
        self.registry
            .get_service(&default_app(), None)
            .expect("default service")
    }
}

/// Registry backed by a fresh in-memory transport with default settings.
pub fn setup_test_storage() -> TestStorage {
    setup_with_transport(MemoryTransport::new(), StorageConfig::default())
}

/// Registry whose transport moves `chunk_size` bytes per progress report.
pub fn setup_chunked_storage(chunk_size: usize, chunk_delay: Duration) -> TestStorage {
    setup_with_transport(
        MemoryTransport::new()
            .with_chunk_size(chunk_size)
            .with_chunk_delay(chunk_delay),
        StorageConfig::default(),
    )
}

pub fn setup_with_transport(transport: MemoryTransport, config: StorageConfig) -> TestStorage {
    let transport = Arc::new(transport);
    let registry = StorageRegistry::new(transport.clone(), config);
    TestStorage {
        registry,
        transport,
    }
}

pub fn default_app() -> AppContext {
    AppContext::new(
        AppIdentity::default_app(),
        AppOptions {
            project_id: Some("react-native-firebase-testing".to_string()),
            storage_bucket: Some(DEFAULT_BUCKET.to_string()),
        },
    )
}

pub fn secondary_app() -> AppContext {
    AppContext::new(
        AppIdentity::named("secondaryFromNative"),
        AppOptions {
            project_id: Some("react-native-firebase-testing".to_string()),
            storage_bucket: Some(DEFAULT_BUCKET.to_string()),
        },
    )
}
