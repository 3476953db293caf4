use crate::image::ImageFormat;
use crate::metadata_store::{composite_id, MetadataStore, MetadataStoreError, PhotoMetadata, Theme};
use crate::notifier::{Notifier, NotifierError};
use crate::object_store::{object_key, ObjectStore, ObjectStoreError};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Pipeline stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Store the image bytes in the object store
    Upload,
    /// Write the metadata record
    Register,
    /// Publish the composite id to the queue
    Notify,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::Register => "register",
            Stage::Notify => "notify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad classification of a stage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The remote call failed; the operation may succeed if retried
    Service,
    /// The service responded but the response was unusable
    Response,
}

/// Structured failure for one pipeline stage
///
/// Callers get the stage identifier, an error kind, and a retryable flag
/// rather than having to parse a status string.
#[derive(Error, Debug, Clone)]
#[error("{stage} stage failed: {message}")]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub retryable: bool,
    pub message: String,
}

impl From<ObjectStoreError> for StageFailure {
    fn from(e: ObjectStoreError) -> Self {
        Self {
            stage: Stage::Upload,
            kind: FailureKind::Service,
            retryable: true,
            message: e.to_string(),
        }
    }
}

impl From<MetadataStoreError> for StageFailure {
    fn from(e: MetadataStoreError) -> Self {
        Self {
            stage: Stage::Register,
            kind: FailureKind::Service,
            retryable: true,
            message: e.to_string(),
        }
    }
}

impl From<NotifierError> for StageFailure {
    fn from(e: NotifierError) -> Self {
        let (kind, retryable) = match e {
            NotifierError::Publish(_) => (FailureKind::Service, true),
            NotifierError::MissingMessageId => (FailureKind::Response, false),
        };
        Self {
            stage: Stage::Notify,
            kind,
            retryable,
            message: e.to_string(),
        }
    }
}

/// Outcome of one attempted stage
#[derive(Debug, Clone)]
pub struct StageStatus {
    pub stage: Stage,
    pub outcome: Result<String, StageFailure>,
}

impl StageStatus {
    fn ok(stage: Stage, message: String) -> Self {
        Self {
            stage,
            outcome: Ok(message),
        }
    }

    fn failed(failure: StageFailure) -> Self {
        Self {
            stage: failure.stage,
            outcome: Err(failure),
        }
    }
}

/// Result of one pipeline invocation
///
/// Holds one status per attempted stage, in stage order. A failed stage is
/// always the last entry: later stages are never attempted after a
/// failure. Partial completion (object stored but metadata write failed,
/// or metadata written but notification lost) is permanent; nothing
/// compensates or reconciles it.
#[derive(Debug, Clone)]
pub struct UploadReport {
    /// Generated id for this photo
    pub photo_id: Uuid,
    /// Key the image was (or would have been) stored under
    pub object_key: String,
    /// Composite id `<uuid>#<user>`: metadata pk and queue payload
    pub metadata_id: String,
    /// Per-stage outcomes in stage order
    pub stages: Vec<StageStatus>,
}

impl UploadReport {
    /// Human-readable status lines, one per attempted stage
    pub fn messages(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|status| match &status.outcome {
                Ok(message) => message.clone(),
                Err(failure) => failure.to_string(),
            })
            .collect()
    }

    /// True when all three stages succeeded
    pub fn is_complete(&self) -> bool {
        self.stages.len() == 3 && self.stages.iter().all(|s| s.outcome.is_ok())
    }

    /// The failure that stopped the run, if any
    pub fn failure(&self) -> Option<&StageFailure> {
        self.stages
            .iter()
            .find_map(|status| status.outcome.as_ref().err())
    }
}

/// Errors raised before any stage runs
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("unsupported image format")]
    UnsupportedImageFormat,
}

/// Upload-and-register pipeline
///
/// Sequences the three client calls, short-circuiting on failure:
/// upload the image, register its metadata, notify downstream consumers.
/// The clients hold no per-request state and are shared across
/// invocations; uniqueness of concurrent uploads comes from the fresh
/// UUID generated per invocation, so no cross-invocation coordination is
/// needed.
pub struct UploadPipeline {
    object_store: Arc<dyn ObjectStore>,
    metadata_store: Arc<dyn MetadataStore>,
    notifier: Arc<dyn Notifier>,
    user: String,
}

impl UploadPipeline {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        metadata_store: Arc<dyn MetadataStore>,
        notifier: Arc<dyn Notifier>,
        user: String,
    ) -> Self {
        Self {
            object_store,
            metadata_store,
            notifier,
            user,
        }
    }

    /// Run the pipeline for one captured image
    ///
    /// Returns a report with one status per attempted stage. The only
    /// error is an undetectable image format, raised before any stage
    /// runs.
    #[instrument(skip(self, image), fields(user = %self.user, theme = %theme, size_bytes = image.len()))]
    pub async fn upload(&self, image: &[u8], theme: Theme) -> Result<UploadReport, UploadError> {
        self.upload_at(image, theme, Uuid::new_v4(), Utc::now())
            .await
    }

    /// Pipeline body with the id and timestamp injected
    ///
    /// The UUID and timestamp are generated once and flow through the
    /// object key, the metadata record, and the queue payload, so the
    /// record's `image_key` always matches the stored object and the
    /// payload always matches the record's `pk`.
    async fn upload_at(
        &self,
        image: &[u8],
        theme: Theme,
        photo_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<UploadReport, UploadError> {
        let format = ImageFormat::detect(image).ok_or(UploadError::UnsupportedImageFormat)?;
        let object_key = object_key(&self.user, photo_id, format, now);
        let metadata_id = composite_id(photo_id, &self.user);
        let mut stages = Vec::with_capacity(3);

        // Stage 1: upload the image bytes
        match self
            .object_store
            .put(&object_key, image, format.content_type())
            .await
        {
            Ok(message) => stages.push(StageStatus::ok(Stage::Upload, message)),
            Err(e) => {
                return Ok(self.abort(photo_id, object_key, metadata_id, stages, e.into()));
            }
        }

        // Stage 2: register metadata, only after the object is durably
        // stored. A failure here leaves the object orphaned; there is no
        // compensating delete.
        let record = PhotoMetadata::new(photo_id, &self.user, &object_key, theme, now);
        match self.metadata_store.put_record(&record).await {
            Ok(message) => stages.push(StageStatus::ok(Stage::Register, message)),
            Err(e) => {
                return Ok(self.abort(photo_id, object_key, metadata_id, stages, e.into()));
            }
        }

        // Stage 3: notify downstream consumers with the composite id. A
        // failure here loses the notification; the metadata stays written.
        match self.notifier.publish(&metadata_id).await {
            Ok(message_id) => stages.push(StageStatus::ok(
                Stage::Notify,
                format!("Notification sent: {message_id}"),
            )),
            Err(e) => {
                return Ok(self.abort(photo_id, object_key, metadata_id, stages, e.into()));
            }
        }

        info!(
            photo_id = %photo_id,
            object_key = %object_key,
            "Upload pipeline completed"
        );
        metrics::counter!("photobooth.uploads.completed").increment(1);

        Ok(UploadReport {
            photo_id,
            object_key,
            metadata_id,
            stages,
        })
    }

    fn abort(
        &self,
        photo_id: Uuid,
        object_key: String,
        metadata_id: String,
        mut stages: Vec<StageStatus>,
        failure: StageFailure,
    ) -> UploadReport {
        warn!(
            photo_id = %photo_id,
            stage = %failure.stage,
            retryable = failure.retryable,
            error = %failure.message,
            "Upload pipeline stopped"
        );
        metrics::counter!("photobooth.uploads.failed").increment(1);

        stages.push(StageStatus::failed(failure));
        UploadReport {
            photo_id,
            object_key,
            metadata_id,
            stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    // 10-byte JPEG payload (magic bytes + padding)
    const JPEG_BYTES: [u8; 10] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0xD9];

    #[derive(Default)]
    struct FakeObjectStore {
        puts: Mutex<Vec<(String, usize, String)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ObjectStore for FakeObjectStore {
        async fn put(
            &self,
            key: &str,
            bytes: &[u8],
            content_type: &str,
        ) -> Result<String, ObjectStoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ObjectStoreError::Put {
                    key: key.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            self.puts.lock().unwrap().push((
                key.to_string(),
                bytes.len(),
                content_type.to_string(),
            ));
            Ok(format!("Photo stored as {key}"))
        }
    }

    #[derive(Default)]
    struct FakeMetadataStore {
        records: Mutex<Vec<PhotoMetadata>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl MetadataStore for FakeMetadataStore {
        async fn put_record(&self, record: &PhotoMetadata) -> Result<String, MetadataStoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MetadataStoreError::Put {
                    image_key: record.image_key.clone(),
                    message: "throughput exceeded".to_string(),
                });
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(format!("Metadata for {} registered", record.image_key))
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        messages: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn publish(&self, message: &str) -> Result<String, NotifierError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifierError::Publish("queue unavailable".to_string()));
            }
            self.messages.lock().unwrap().push(message.to_string());
            Ok("msg-0001".to_string())
        }
    }

    struct Harness {
        object_store: Arc<FakeObjectStore>,
        metadata_store: Arc<FakeMetadataStore>,
        notifier: Arc<FakeNotifier>,
        pipeline: UploadPipeline,
    }

    fn harness() -> Harness {
        let object_store = Arc::new(FakeObjectStore::default());
        let metadata_store = Arc::new(FakeMetadataStore::default());
        let notifier = Arc::new(FakeNotifier::default());
        let pipeline = UploadPipeline::new(
            object_store.clone(),
            metadata_store.clone(),
            notifier.clone(),
            "alice@example.com".to_string(),
        );
        Harness {
            object_store,
            metadata_store,
            notifier,
            pipeline,
        }
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let h = harness();

        let report = h.pipeline.upload(&JPEG_BYTES, Theme::Surfer).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.stages.len(), 3);
        assert_eq!(
            report.stages.iter().map(|s| s.stage).collect::<Vec<_>>(),
            vec![Stage::Upload, Stage::Register, Stage::Notify]
        );
        assert_eq!(report.messages().len(), 3);
        assert!(report.failure().is_none());

        // The queue payload is the metadata pk, verbatim
        let records = h.metadata_store.records.lock().unwrap();
        let messages = h.notifier.messages.lock().unwrap();
        assert_eq!(messages.as_slice(), &[records[0].pk.clone()]);
        assert_eq!(records[0].pk, report.metadata_id);
    }

    #[tokio::test]
    async fn test_image_key_matches_stored_object() {
        let h = harness();

        let report = h.pipeline.upload(&JPEG_BYTES, Theme::Urban).await.unwrap();

        let puts = h.object_store.puts.lock().unwrap();
        let records = h.metadata_store.records.lock().unwrap();
        assert_eq!(puts[0].0, report.object_key);
        assert_eq!(records[0].image_key, report.object_key);
        assert_eq!(puts[0].1, JPEG_BYTES.len());
        assert_eq!(puts[0].2, "image/jpeg");
    }

    #[tokio::test]
    async fn test_object_store_failure_gates_later_stages() {
        let h = harness();
        h.object_store.fail.store(true, Ordering::SeqCst);

        let report = h.pipeline.upload(&JPEG_BYTES, Theme::Surfer).await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.stages.len(), 1);
        let failure = report.failure().unwrap();
        assert_eq!(failure.stage, Stage::Upload);
        assert_eq!(failure.kind, FailureKind::Service);
        assert!(failure.retryable);

        assert!(h.metadata_store.records.lock().unwrap().is_empty());
        assert!(h.notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_failure_gates_notification() {
        let h = harness();
        h.metadata_store.fail.store(true, Ordering::SeqCst);

        let report = h.pipeline.upload(&JPEG_BYTES, Theme::Surfer).await.unwrap();

        assert_eq!(report.stages.len(), 2);
        assert!(report.stages[0].outcome.is_ok());
        let failure = report.failure().unwrap();
        assert_eq!(failure.stage, Stage::Register);
        assert!(failure.retryable);

        // The object stays stored (orphaned); the notifier is never called
        assert_eq!(h.object_store.puts.lock().unwrap().len(), 1);
        assert!(h.notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notify_failure_keeps_metadata() {
        let h = harness();
        h.notifier.fail.store(true, Ordering::SeqCst);

        let report = h.pipeline.upload(&JPEG_BYTES, Theme::Surfer).await.unwrap();

        assert_eq!(report.stages.len(), 3);
        let failure = report.failure().unwrap();
        assert_eq!(failure.stage, Stage::Notify);
        assert_eq!(h.metadata_store.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_uploads_get_distinct_keys() {
        let h = harness();

        let first = h.pipeline.upload(&JPEG_BYTES, Theme::Surfer).await.unwrap();
        let second = h.pipeline.upload(&JPEG_BYTES, Theme::Surfer).await.unwrap();

        assert_ne!(first.object_key, second.object_key);
        assert_ne!(first.metadata_id, second.metadata_id);
    }

    #[tokio::test]
    async fn test_unsupported_format_rejected_before_stages() {
        let h = harness();

        let result = h.pipeline.upload(b"not an image", Theme::Surfer).await;

        assert!(matches!(result, Err(UploadError::UnsupportedImageFormat)));
        assert!(h.object_store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_key_and_record_shape_for_fixed_inputs() {
        let h = harness();
        let photo_id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 10, 30, 45).unwrap();

        let report = h
            .pipeline
            .upload_at(&JPEG_BYTES, Theme::Surfer, photo_id, now)
            .await
            .unwrap();

        assert_eq!(
            report.object_key,
            "user-photos/2024/05/alice@example.com-550e8400-e29b-41d4-a716-446655440000.jpeg"
        );
        let records = h.metadata_store.records.lock().unwrap();
        assert_eq!(
            records[0].pk,
            "550e8400-e29b-41d4-a716-446655440000#alice@example.com"
        );
        assert_eq!(records[0].sk, "alice@example.com");
        assert_eq!(records[0].theme, Theme::Surfer);
        assert_eq!(records[0].created_iso(), "2024-05-17T10:30:45.000000Z");
    }
}
