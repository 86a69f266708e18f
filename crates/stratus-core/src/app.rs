//! Application identity and context
//!
//! Every storage service belongs to exactly one application. The application
//! context collaborator hands out [`AppContext`] values (identity plus the
//! app's options) and tells interested parties when an app is torn down.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::bucket::BucketAddress;
use crate::constants::DEFAULT_APP_NAME;
use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppIdentity {
    name: String,
}

impl AppIdentity {
    pub fn default_app() -> Self {
        Self {
            name: DEFAULT_APP_NAME.to_string(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_APP_NAME
    }
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self::default_app()
    }
}

impl Display for AppIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.name)
    }
}

/// Options an application was configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppOptions {
    pub project_id: Option<String>,
    /// Default bucket, with or without the `gs://` scheme.
    pub storage_bucket: Option<String>,
}

/// An application identity together with its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    identity: AppIdentity,
    options: AppOptions,
}

impl AppContext {
    pub fn new(identity: AppIdentity, options: AppOptions) -> Self {
        Self { identity, options }
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    /// The bucket configured for this app, in canonical form.
    pub fn default_bucket(&self, storage_domain: &str) -> StorageResult<BucketAddress> {
        let configured = self
            .options
            .storage_bucket
            .as_deref()
            .filter(|bucket| !bucket.trim().is_empty())
            .ok_or_else(|| StorageError::NoDefaultBucket(self.identity.name.clone()))?;
        BucketAddress::from_config(configured, storage_domain)
    }

    /// Resolve an explicit bucket URL, or fall back to the app's default bucket.
    pub fn resolve_bucket(
        &self,
        bucket: Option<&str>,
        storage_domain: &str,
    ) -> StorageResult<BucketAddress> {
        match bucket {
            Some(url) => BucketAddress::parse_with_domain(url, storage_domain),
            None => self.default_bucket(storage_domain),
        }
    }
}

/// Receives application teardown notifications.
pub trait AppLifecycleListener: Send + Sync {
    fn on_app_deleted(&self, identity: &AppIdentity);
}
