use crate::config::S3Config;
use crate::image::ImageFormat;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Fixed prefix under which all captured photos are stored
pub const KEY_PREFIX: &str = "user-photos";

/// Errors from the object store client
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("failed to store object {key}: {message}")]
    Put { key: String, message: String },
}

/// Derive the object key for a captured photo
///
/// Format: `user-photos/<YYYY>/<MM>/<user>-<uuid>.<ext>`
///
/// The year/month partition supports lifecycle/retention policies; the
/// freshly generated UUID makes the key globally unique per upload. Pure
/// function of its inputs so key generation is deterministic under test.
pub fn object_key(user: &str, photo_id: Uuid, format: ImageFormat, at: DateTime<Utc>) -> String {
    format!(
        "{KEY_PREFIX}/{partition}/{user}-{photo_id}.{ext}",
        partition = at.format("%Y/%m"),
        ext = format.extension()
    )
}

/// Client for durably persisting image payloads
///
/// The bucket is fixed at construction; `put` returns a human-readable
/// confirmation on success.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;
}

/// S3-backed object store
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    region: String,
}

impl S3ObjectStore {
    /// Create a new S3 object store from the shared SDK config
    pub fn new(sdk_config: &aws_config::SdkConfig, config: &S3Config) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = S3Client::from_conf(builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 object store initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, key = %key))]
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        debug!(size_bytes = bytes.len(), content_type = %content_type, "Uploading photo to S3");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Put {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        metrics::counter!("photobooth.photos.stored").increment(1);
        metrics::counter!("photobooth.bytes.uploaded").increment(bytes.len() as u64);

        Ok(format!(
            "Photo stored as {key} ({url})",
            url = console_url(&self.region, &self.bucket, key)
        ))
    }
}

/// Console-viewer URL for a stored object
fn console_url(region: &str, bucket: &str, key: &str) -> String {
    format!("https://s3.console.aws.amazon.com/s3/object/{bucket}?region={region}&prefix={key}")
}
