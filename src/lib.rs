//! Photobooth Uploader
//!
//! Upload-and-register pipeline for the AI photobooth demo. A captured
//! photo is stored in S3, its metadata is registered in DynamoDB, and the
//! composite photo id is published to SQS for downstream consumers, with
//! each stage gated on the previous one succeeding.
//!
//! ## Architecture
//!
//! ```text
//! Caller (UI / CLI)          S3 Bucket                DynamoDB
//! ┌──────────────┐          ┌──────────────┐         ┌──────────────┐
//! │ image bytes  │          │ user-photos/ │         │ pk: uuid#user│
//! │ + theme      │─────────▶│   {yyyy}/    │         │ sk: user     │
//! └──────────────┘          │   {mm}/      │         │ image_key    │
//!        │                  └──────────────┘         └──────────────┘
//!        ▼                         ▲                        ▲
//! ┌──────────────┐                 │ 1. upload              │ 2. register
//! │ Upload       │─────────────────┴────────────────────────┘
//! │ Pipeline     │─────────────────┐ 3. notify
//! └──────────────┘                 ▼
//!                           ┌──────────────┐
//!                           │ SQS queue    │
//!                           │ "uuid#user"  │
//!                           └──────────────┘
//! ```
//!
//! Stages never retry and nothing spans them transactionally: a failure
//! stops the run and leaves earlier side effects in place (a stored object
//! without metadata, or metadata without a notification). The report
//! returned to the caller says exactly which stage stopped the run and
//! whether retrying could help.

pub mod config;
pub mod image;
pub mod metadata_store;
pub mod notifier;
pub mod object_store;
pub mod pipeline;

pub use config::Config;
pub use image::ImageFormat;
pub use metadata_store::{
    DynamoDbMetadataStore, MetadataStore, MetadataStoreError, PhotoMetadata, Theme, UnknownTheme,
};
pub use notifier::{Notifier, NotifierError, SqsNotifier};
pub use object_store::{ObjectStore, ObjectStoreError, S3ObjectStore};
pub use pipeline::{
    FailureKind, Stage, StageFailure, StageStatus, UploadError, UploadPipeline, UploadReport,
};
