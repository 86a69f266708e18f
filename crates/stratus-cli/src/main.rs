//! Stratus CLI: inspect bucket addresses and run transfers against the
//! in-memory transport.
//!
//! Storage defaults come from STRATUS_* variables (see `StorageConfig`); the
//! default bucket for `--app` comes from STRATUS_APP_BUCKET (see `CliConfig`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::sync::Arc;
use stratus_cli::{app_context, print_json, CliConfig};
use stratus_core::{BucketAddress, SettableMetadata, StorageConfig, StringFormat};
use stratus_infra::{init_telemetry, shutdown_telemetry, ErrorResponse, TelemetryConfig};
use stratus_storage::{MemoryTransport, StorageRegistry};

#[derive(Parser)]
#[command(name = "stratus", about = "Stratus storage client CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a bucket URL and print its canonical form
    Bucket {
        /// Bucket URL, e.g. gs://my-app
        url: String,
    },
    /// Upload a string and print every task snapshot
    PutString {
        /// Object path inside the bucket
        path: String,
        /// Payload, interpreted according to --format
        data: String,
        /// Bucket URL; defaults to the app's bucket
        #[arg(long)]
        bucket: Option<String>,
        /// App name; defaults to [DEFAULT]
        #[arg(long)]
        app: Option<String>,
        /// raw, base64, base64url or data_url
        #[arg(long, default_value = "raw")]
        format: StringFormat,
        /// Content type stored with the object
        #[arg(long)]
        content_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let telemetry = TelemetryConfig::from_env()?;
    init_telemetry(&telemetry)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let config = StorageConfig::from_env().context("Invalid storage configuration")?;
    let cli_config = CliConfig::from_env().context("Invalid CLI configuration")?;
    let cli = Cli::parse();

    let result = run(cli.command, config, cli_config).await;
    shutdown_telemetry().await;
    result
}

async fn run(
    command: Commands,
    config: StorageConfig,
    cli_config: CliConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Bucket { url } => {
            let bucket = match BucketAddress::parse_with_domain(&url, &config.storage_domain) {
                Ok(bucket) => bucket,
                Err(err) => {
                    print_json(&ErrorResponse::from(&err))?;
                    return Err(err.into());
                }
            };
            print_json(&serde_json::json!({
                "bucket": bucket.as_str(),
                "name": bucket.bucket_name(),
            }))?;
        }
        Commands::PutString {
            path,
            data,
            bucket,
            app,
            format,
            content_type,
        } => {
            let registry = StorageRegistry::new(Arc::new(MemoryTransport::new()), config);
            let app = app_context(app.as_deref(), cli_config.app_bucket);
            let metadata = SettableMetadata {
                content_type,
                ..SettableMetadata::default()
            };

            let started = registry
                .get_service(&app, bucket.as_deref())
                .and_then(|service| service.reference(&path))
                .and_then(|reference| reference.put_string(&data, format, metadata));
            let mut task = match started {
                Ok(task) => task,
                Err(err) => {
                    print_json(&ErrorResponse::from(&err))?;
                    return Err(err.into());
                }
            };

            if let Some(mut progress) = task.progress() {
                while let Some(snapshot) = progress.next().await {
                    print_json(&snapshot)?;
                }
            }
            if let Err(err) = task.await {
                print_json(&ErrorResponse::from(&err))?;
                return Err(err.into());
            }
        }
    }

    Ok(())
}
