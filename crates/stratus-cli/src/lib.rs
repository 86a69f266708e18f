use anyhow::Context;
use serde::Serialize;
use std::env;
use stratus_core::constants::DEFAULT_APP_NAME;
use stratus_core::{AppContext, AppIdentity, AppOptions};

/// CLI settings that are not storage defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliConfig {
    /// Default bucket for the app named by `--app` (STRATUS_APP_BUCKET).
    pub app_bucket: Option<String>,
}

impl CliConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let app_bucket = lookup("STRATUS_APP_BUCKET")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self { app_bucket })
    }
}

/// Build the app context for `--app`, using `bucket` as its default bucket.
pub fn app_context(name: Option<&str>, bucket: Option<String>) -> AppContext {
    let identity = match name {
        Some(name) if name != DEFAULT_APP_NAME => AppIdentity::named(name),
        _ => AppIdentity::default_app(),
    };
    AppContext::new(
        identity,
        AppOptions {
            project_id: None,
            storage_bucket: bucket.filter(|bucket| !bucket.trim().is_empty()),
        },
    )
}

/// Render `value` as pretty JSON.
pub fn to_json(value: &impl Serialize) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("Serialize output")
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", to_json(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_app_when_unnamed() {
        let app = app_context(None, Some("photos".to_string()));
        assert!(app.identity().is_default());
        assert_eq!(app.options().storage_bucket.as_deref(), Some("photos"));

        let explicit = app_context(Some("[DEFAULT]"), None);
        assert!(explicit.identity().is_default());
    }

    #[test]
    fn named_app() {
        let app = app_context(Some("secondary"), Some("  ".to_string()));
        assert_eq!(app.identity().name(), "secondary");
        assert_eq!(app.options().storage_bucket, None);
    }

    #[test]
    fn cli_config_reads_app_bucket() {
        let config = CliConfig::from_lookup(|key| match key {
            "STRATUS_APP_BUCKET" => Some(" gs://photos ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.app_bucket.as_deref(), Some("gs://photos"));

        let blank = CliConfig::from_lookup(|_| Some("   ".to_string())).unwrap();
        assert_eq!(blank, CliConfig::default());
        assert_eq!(CliConfig::from_lookup(|_| None).unwrap().app_bucket, None);
    }

    #[test]
    fn json_output() {
        let out = to_json(&serde_json::json!({ "bucket": "gs://photos.appspot.com" })).unwrap();
        assert!(out.contains("\"bucket\": \"gs://photos.appspot.com\""));
    }
}
