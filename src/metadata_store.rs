use crate::config::DynamoDbConfig;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

// Attribute names in the metadata table
const ATTR_PK: &str = "pk";
const ATTR_SK: &str = "sk";
const ATTR_IMAGE_KEY: &str = "image_key";
const ATTR_THEME: &str = "theme";
const ATTR_CREATED: &str = "created";

/// Visual theme the user picked before capturing the photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    Surfer,
    #[serde(rename = "Movie Poster")]
    MoviePoster,
    Urban,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Surfer => "Surfer",
            Theme::MoviePoster => "Movie Poster",
            Theme::Urban => "Urban",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown theme name
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unsupported theme: {0}")]
pub struct UnknownTheme(pub String);

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Surfer" => Ok(Theme::Surfer),
            "Movie Poster" => Ok(Theme::MoviePoster),
            "Urban" => Ok(Theme::Urban),
            other => Err(UnknownTheme(other.to_string())),
        }
    }
}

/// Metadata record for one stored photo
///
/// `pk` is the composite id `<uuid>#<user>` that downstream consumers
/// dereference; `sk` is the user identifier. `image_key` must reference an
/// object already stored when the record is written (the pipeline enforces
/// the ordering; nothing at the storage layer does).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoMetadata {
    /// Composite partition key: `<uuid>#<user>`
    pub pk: String,
    /// Sort key: the user identifier
    pub sk: String,
    /// Object key of the stored photo
    pub image_key: String,
    /// Theme the user picked
    pub theme: Theme,
    /// Record creation time (UTC)
    pub created: DateTime<Utc>,
}

impl PhotoMetadata {
    /// Build the record for a freshly stored photo
    ///
    /// The timestamp is supplied by the caller rather than read from the
    /// wall clock here, so records are reproducible under test.
    pub fn new(
        photo_id: Uuid,
        user: &str,
        image_key: &str,
        theme: Theme,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            pk: composite_id(photo_id, user),
            sk: user.to_string(),
            image_key: image_key.to_string(),
            theme,
            created,
        }
    }

    /// ISO-8601 UTC timestamp with `Z` suffix, as stored in the table
    pub fn created_iso(&self) -> String {
        self.created.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// Composite id `<uuid>#<user>`, used as the record key and queue payload
pub fn composite_id(photo_id: Uuid, user: &str) -> String {
    format!("{photo_id}#{user}")
}

/// Errors from the metadata store client
#[derive(Error, Debug)]
pub enum MetadataStoreError {
    #[error("failed to write metadata for {image_key}: {message}")]
    Put { image_key: String, message: String },
}

/// Client for registering photo metadata
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_record(&self, record: &PhotoMetadata) -> Result<String, MetadataStoreError>;
}

/// DynamoDB-backed metadata store
pub struct DynamoDbMetadataStore {
    client: DynamoDbClient,
    table: String,
}

impl DynamoDbMetadataStore {
    /// Create a new metadata store from the shared SDK config
    pub fn new(sdk_config: &aws_config::SdkConfig, config: &DynamoDbConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        // Configure custom endpoint for LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        let client = DynamoDbClient::from_conf(builder.build());

        info!(table = %config.table, "DynamoDB metadata store initialized");

        Self {
            client,
            table: config.table.clone(),
        }
    }
}

#[async_trait]
impl MetadataStore for DynamoDbMetadataStore {
    #[instrument(skip(self, record), fields(table = %self.table, pk = %record.pk))]
    async fn put_record(&self, record: &PhotoMetadata) -> Result<String, MetadataStoreError> {
        debug!(image_key = %record.image_key, theme = %record.theme, "Writing photo metadata");

        // Unconditional put: writing the same id twice overwrites silently
        // (last-write-wins). Ids are fresh UUIDs per upload, so collisions
        // do not occur in practice.
        self.client
            .put_item()
            .table_name(&self.table)
            .item(ATTR_PK, AttributeValue::S(record.pk.clone()))
            .item(ATTR_SK, AttributeValue::S(record.sk.clone()))
            .item(ATTR_IMAGE_KEY, AttributeValue::S(record.image_key.clone()))
            .item(ATTR_THEME, AttributeValue::S(record.theme.to_string()))
            .item(ATTR_CREATED, AttributeValue::S(record.created_iso()))
            .send()
            .await
            .map_err(|e| MetadataStoreError::Put {
                image_key: record.image_key.clone(),
                message: e.to_string(),
            })?;

        metrics::counter!("photobooth.metadata.indexed").increment(1);

        Ok(format!(
            "Metadata for {image_key} registered",
            image_key = record.image_key
        ))
    }
}
