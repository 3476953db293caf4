use crate::config::SqsConfig;
use async_trait::async_trait;
use aws_sdk_sqs::Client as SqsClient;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors from the notification publisher
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("failed to publish notification: {0}")]
    Publish(String),
    #[error("broker accepted the message but returned no message id")]
    MissingMessageId,
}

/// Publisher for downstream-consumer notifications
///
/// The payload is an opaque string (the composite photo id); the `Ok`
/// value is the broker-assigned message id. Delivery is at-least-once on
/// the broker side; there is no retry, backoff, or dead-letter handling
/// here.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, message: &str) -> Result<String, NotifierError>;
}

/// SQS-backed notification publisher
pub struct SqsNotifier {
    client: SqsClient,
    queue_url: String,
}

impl SqsNotifier {
    /// Create a new notifier from the shared SDK config
    pub fn new(sdk_config: &aws_config::SdkConfig, config: &SqsConfig) -> Self {
        let mut builder = aws_sdk_sqs::config::Builder::from(sdk_config);

        // Configure custom endpoint for LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        let client = SqsClient::from_conf(builder.build());

        info!(queue_url = %config.queue_url, "SQS notifier initialized");

        Self {
            client,
            queue_url: config.queue_url.clone(),
        }
    }
}

#[async_trait]
impl Notifier for SqsNotifier {
    #[instrument(skip(self), fields(queue_url = %self.queue_url))]
    async fn publish(&self, message: &str) -> Result<String, NotifierError> {
        debug!(payload = %message, "Publishing notification");

        let response = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(message)
            .send()
            .await
            .map_err(|e| NotifierError::Publish(e.to_string()))?;

        let message_id = response
            .message_id()
            .map(str::to_string)
            .ok_or(NotifierError::MissingMessageId)?;

        metrics::counter!("photobooth.notifications.sent").increment(1);

        Ok(message_id)
    }
}
