use serde::Deserialize;

/// Main configuration for the uploader
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// S3 object storage configuration
    pub s3: S3Config,
    /// DynamoDB metadata table configuration
    pub dynamodb: DynamoDbConfig,
    /// SQS notification queue configuration
    pub sqs: SqsConfig,
    /// Fixed user identity (demo placeholder, not a login system)
    pub user: UserConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// S3 object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// S3 bucket name for captured photos
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
}

/// DynamoDB metadata table configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DynamoDbConfig {
    /// Table holding photo metadata records
    pub table: String,
    /// Custom endpoint URL (for LocalStack)
    pub endpoint_url: Option<String>,
}

/// SQS notification queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SqsConfig {
    /// Queue URL downstream consumers read from
    pub queue_url: String,
    /// Custom endpoint URL (for LocalStack)
    pub endpoint_url: Option<String>,
}

/// Fixed user identity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    /// Email address used as the user identifier in keys and records
    pub email: String,
}

// Default value functions
fn default_service_name() -> String {
    "photobooth-uploader".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Config {
    /// Load configuration from environment and config files
    ///
    /// Required values (bucket, table, queue URL, user email) have no
    /// defaults; a missing one fails the load and the process must not
    /// start.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Add config file if present
            .add_source(config::File::with_name("config/uploader").required(false))
            .add_source(config::File::with_name("/etc/photobooth/uploader").required(false))
            // Override with environment variables
            // PHOTOBOOTH__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("PHOTOBOOTH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_defaults() {
        let service = ServiceConfig::default();
        assert_eq!(service.name, "photobooth-uploader");
        assert_eq!(service.log_level, "info");
        assert_eq!(service.metrics_port, 9090);
    }

    #[test]
    fn test_default_region() {
        assert_eq!(default_region(), "us-east-1");
    }
}
