//! Configuration module
//!
//! Storage defaults applied to every newly created storage service. Values come
//! from `STRATUS_*` environment variables (a `.env` file is honoured) and fall
//! back to the constants in [`crate::constants`] when unset or unparsable.

use std::env;

use crate::constants::{
    BUCKET_SCHEME, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS,
    DEFAULT_MAX_DOWNLOAD_RETRY_TIME_MS, DEFAULT_MAX_OPERATION_RETRY_TIME_MS,
    DEFAULT_MAX_UPLOAD_RETRY_TIME_MS, DEFAULT_REGISTRY_SHARDS, DEFAULT_STORAGE_DOMAIN,
};
use crate::retry_time::{RetryCategory, RetryTime};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    pub max_operation_retry_time_ms: u64,
    pub max_upload_retry_time_ms: u64,
    pub max_download_retry_time_ms: u64,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Number of independently locked shards in the service registry.
    pub registry_shards: usize,
    /// Domain appended to bucket names without a suffix.
    pub storage_domain: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_operation_retry_time_ms: DEFAULT_MAX_OPERATION_RETRY_TIME_MS,
            max_upload_retry_time_ms: DEFAULT_MAX_UPLOAD_RETRY_TIME_MS,
            max_download_retry_time_ms: DEFAULT_MAX_DOWNLOAD_RETRY_TIME_MS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            registry_shards: DEFAULT_REGISTRY_SHARDS,
            storage_domain: DEFAULT_STORAGE_DOMAIN.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let defaults = Self::default();
        let number = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(default)
        };

        let config = Self {
            max_operation_retry_time_ms: number(
                "STRATUS_MAX_OPERATION_RETRY_TIME_MS",
                defaults.max_operation_retry_time_ms,
            ),
            max_upload_retry_time_ms: number(
                "STRATUS_MAX_UPLOAD_RETRY_TIME_MS",
                defaults.max_upload_retry_time_ms,
            ),
            max_download_retry_time_ms: number(
                "STRATUS_MAX_DOWNLOAD_RETRY_TIME_MS",
                defaults.max_download_retry_time_ms,
            ),
            initial_backoff_ms: number("STRATUS_INITIAL_BACKOFF_MS", defaults.initial_backoff_ms),
            max_backoff_ms: number("STRATUS_MAX_BACKOFF_MS", defaults.max_backoff_ms),
            registry_shards: lookup("STRATUS_REGISTRY_SHARDS")
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(defaults.registry_shards),
            storage_domain: lookup("STRATUS_STORAGE_DOMAIN")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.storage_domain),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.initial_backoff_ms == 0 {
            return Err(anyhow::anyhow!(
                "STRATUS_INITIAL_BACKOFF_MS must be greater than zero"
            ));
        }

        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(anyhow::anyhow!(
                "STRATUS_MAX_BACKOFF_MS must be at least STRATUS_INITIAL_BACKOFF_MS"
            ));
        }

        if self.registry_shards == 0 {
            return Err(anyhow::anyhow!(
                "STRATUS_REGISTRY_SHARDS must be greater than zero"
            ));
        }

        if self.storage_domain.contains("://") || self.storage_domain.contains('/') {
            return Err(anyhow::anyhow!(
                "STRATUS_STORAGE_DOMAIN must be a bare domain without '{}' or a path",
                BUCKET_SCHEME
            ));
        }

        Ok(())
    }

    /// Default ceiling for the given retry category.
    pub fn retry_time(&self, category: RetryCategory) -> RetryTime {
        RetryTime::from_millis(match category {
            RetryCategory::Operation => self.max_operation_retry_time_ms,
            RetryCategory::Upload => self.max_upload_retry_time_ms,
            RetryCategory::Download => self.max_download_retry_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = StorageConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StorageConfig::default());
        assert_eq!(config.max_operation_retry_time_ms, 120_000);
        assert_eq!(config.max_upload_retry_time_ms, 600_000);
        assert_eq!(config.max_download_retry_time_ms, 600_000);
        assert_eq!(config.storage_domain, "appspot.com");
    }

    #[test]
    fn test_config_overrides() {
        let config = StorageConfig::from_lookup(lookup(&[
            ("STRATUS_MAX_UPLOAD_RETRY_TIME_MS", "5000"),
            ("STRATUS_REGISTRY_SHARDS", "4"),
            ("STRATUS_STORAGE_DOMAIN", "storage.test"),
        ]))
        .unwrap();
        assert_eq!(config.max_upload_retry_time_ms, 5_000);
        assert_eq!(config.registry_shards, 4);
        assert_eq!(config.storage_domain, "storage.test");
        assert_eq!(config.retry_time(RetryCategory::Upload).as_millis(), 5_000);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = StorageConfig::from_lookup(lookup(&[(
            "STRATUS_MAX_OPERATION_RETRY_TIME_MS",
            "im a teapot",
        )]))
        .unwrap();
        assert_eq!(config.max_operation_retry_time_ms, 120_000);
    }

    #[test]
    fn test_config_validation() {
        assert!(StorageConfig::from_lookup(lookup(&[("STRATUS_REGISTRY_SHARDS", "0")])).is_err());
        assert!(StorageConfig::from_lookup(lookup(&[
            ("STRATUS_INITIAL_BACKOFF_MS", "5000"),
            ("STRATUS_MAX_BACKOFF_MS", "100"),
        ]))
        .is_err());
        assert!(
            StorageConfig::from_lookup(lookup(&[("STRATUS_STORAGE_DOMAIN", "gs://x")])).is_err()
        );
    }
}
