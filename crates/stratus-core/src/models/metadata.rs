use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata a caller may set on an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettableMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_metadata: BTreeMap<String, String>,
}

impl SettableMetadata {
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    /// Overlay the fields set in `other` onto `self`.
    pub fn merge(&mut self, other: &SettableMetadata) {
        if other.content_type.is_some() {
            self.content_type = other.content_type.clone();
        }
        if other.cache_control.is_some() {
            self.cache_control = other.cache_control.clone();
        }
        if other.content_disposition.is_some() {
            self.content_disposition = other.content_disposition.clone();
        }
        if other.content_encoding.is_some() {
            self.content_encoding = other.content_encoding.clone();
        }
        if other.content_language.is_some() {
            self.content_language = other.content_language.clone();
        }
        for (key, value) in &other.custom_metadata {
            self.custom_metadata.insert(key.clone(), value.clone());
        }
    }
}

/// Metadata the backend reports for a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullMetadata {
    pub bucket: String,
    pub full_path: String,
    pub name: String,
    pub size: u64,
    pub generation: String,
    pub metageneration: String,
    pub time_created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,
    #[serde(flatten)]
    pub settable: SettableMetadata,
}

impl FullMetadata {
    pub fn content_type(&self) -> Option<&str> {
        self.settable.content_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlays_set_fields() {
        let mut base = SettableMetadata::with_content_type("text/plain");
        base.custom_metadata
            .insert("owner".to_string(), "alice".to_string());

        let mut update = SettableMetadata {
            cache_control: Some("no-cache".to_string()),
            ..SettableMetadata::default()
        };
        update
            .custom_metadata
            .insert("owner".to_string(), "bob".to_string());

        base.merge(&update);
        assert_eq!(base.content_type.as_deref(), Some("text/plain"));
        assert_eq!(base.cache_control.as_deref(), Some("no-cache"));
        assert_eq!(base.custom_metadata["owner"], "bob");
    }

    #[test]
    fn serializes_camel_case() {
        let metadata = SettableMetadata::with_content_type("application/json");
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json, serde_json::json!({ "contentType": "application/json" }));
    }
}
