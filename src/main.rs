mod config;
mod image;
mod metadata_store;
mod notifier;
mod object_store;
mod pipeline;

use anyhow::{bail, Context, Result};
use aws_config::BehaviorVersion;
use config::Config;
use metadata_store::{DynamoDbMetadataStore, Theme};
use notifier::SqsNotifier;
use object_store::S3ObjectStore;
use pipeline::UploadPipeline;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration; a missing required value is fatal
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting photobooth uploader"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Stand-in for the presentation layer: the captured image and chosen
    // theme come from the command line
    let mut args = std::env::args().skip(1);
    let (image_path, theme) = match (args.next(), args.next()) {
        (Some(path), Some(theme)) => (path, theme),
        _ => bail!("usage: photobooth-uploader <image-path> <theme>"),
    };

    let theme: Theme = theme
        .parse()
        .context("Theme must be one of: Surfer, Movie Poster, Urban")?;

    let image = tokio::fs::read(&image_path)
        .await
        .with_context(|| format!("Failed to read image from {image_path}"))?;

    // One shared SDK config; the three clients are process-wide singletons
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(config.s3.region.clone()))
        .load()
        .await;

    let object_store = Arc::new(S3ObjectStore::new(&sdk_config, &config.s3));
    let metadata_store = Arc::new(DynamoDbMetadataStore::new(&sdk_config, &config.dynamodb));
    let notifier = Arc::new(SqsNotifier::new(&sdk_config, &config.sqs));

    let uploader = UploadPipeline::new(
        object_store,
        metadata_store,
        notifier,
        config.user.email.clone(),
    );

    let report = uploader
        .upload(&image, theme)
        .await
        .context("Failed to run upload pipeline")?;

    // Display the per-stage status lines, as the UI would
    for message in report.messages() {
        println!("{message}");
    }

    if let Some(failure) = report.failure() {
        bail!("upload pipeline stopped at the {} stage", failure.stage);
    }

    info!(photo_id = %report.photo_id, "Photo uploaded and registered");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}
