//! Bucket addressing
//!
//! A bucket is addressed as `gs://host[.suffix]`. Hosts without a domain suffix
//! get the default storage domain appended, so `gs://photos` and
//! `gs://photos.appspot.com` name the same bucket.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::{BUCKET_SCHEME, DEFAULT_STORAGE_DOMAIN};
use crate::error::{StorageError, StorageResult};

/// Canonical, validated bucket identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketAddress {
    canonical: String,
}

impl BucketAddress {
    /// Parse a bucket URL using the default storage domain.
    pub fn parse(input: &str) -> StorageResult<Self> {
        Self::parse_with_domain(input, DEFAULT_STORAGE_DOMAIN)
    }

    /// Parse a bucket URL, appending `default_domain` when the host has no suffix.
    pub fn parse_with_domain(input: &str, default_domain: &str) -> StorageResult<Self> {
        let host = input.strip_prefix(BUCKET_SCHEME).ok_or_else(|| {
            StorageError::InvalidBucketAddress(format!(
                "bucket url must be a string and begin with '{}', got '{}'",
                BUCKET_SCHEME, input
            ))
        })?;
        let host = host.trim_end_matches('/');

        if host.is_empty() {
            return Err(StorageError::InvalidBucketAddress(format!(
                "bucket url '{}' does not name a bucket",
                input
            )));
        }
        if host.contains('/') || host.chars().any(char::is_whitespace) {
            return Err(StorageError::InvalidBucketAddress(format!(
                "bucket url '{}' must not contain a path or whitespace",
                input
            )));
        }

        let canonical = if host.contains('.') {
            format!("{}{}", BUCKET_SCHEME, host)
        } else {
            let domain = default_domain.trim_start_matches('.');
            format!("{}{}.{}", BUCKET_SCHEME, host, domain)
        };

        Ok(Self { canonical })
    }

    /// Resolve a configured default bucket, which may omit the scheme.
    pub fn from_config(value: &str, default_domain: &str) -> StorageResult<Self> {
        let value = value.trim();
        if value.starts_with(BUCKET_SCHEME) {
            Self::parse_with_domain(value, default_domain)
        } else {
            Self::parse_with_domain(&format!("{}{}", BUCKET_SCHEME, value), default_domain)
        }
    }

    /// Canonical `gs://` form.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Bucket host without the scheme, e.g. `photos.appspot.com`.
    pub fn bucket_name(&self) -> &str {
        &self.canonical[BUCKET_SCHEME.len()..]
    }
}

impl Display for BucketAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.canonical)
    }
}

impl FromStr for BucketAddress {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BucketAddress {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BucketAddress> for String {
    fn from(address: BucketAddress) -> Self {
        address.canonical
    }
}
