//! S3-compatible object storage
//!
//! The analyzer talks to an [`ObjectStoreClient`], a narrow view of the S3 API
//! (`ListObjectsV2` plus the multipart initiate/abort pair). The production client is
//! built on `aws-sdk-s3`; tests use the in-memory store behind `test-helpers`.

mod analyzer;
#[cfg(feature = "storage-s3")]
mod aws;
#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

use async_trait::async_trait;
use dstools_core::{S3Config, StorageOpError, StorageResult};
use std::sync::Arc;
use thiserror::Error;

pub use analyzer::{S3Analyzer, PROBE_OBJECT_PREFIX};
#[cfg(feature = "storage-s3")]
pub use aws::{AwsClientFactory, AwsS3Client};

/// One `ListObjectsV2` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: Option<i32>,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

impl ObjectSummary {
    /// Zero-byte keys ending in `/` are console-created folder markers, not data.
    pub fn is_directory_marker(&self) -> bool {
        self.size == 0 && self.key.ends_with('/')
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsPage {
    pub objects: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
    /// Present only when the listing is truncated.
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectStoreClientError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("credentials rejected: {0}")]
    Unauthenticated(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("service error: {0}")]
    Service(String),
}

impl From<ObjectStoreClientError> for StorageOpError {
    fn from(err: ObjectStoreClientError) -> Self {
        match err {
            ObjectStoreClientError::AccessDenied(msg) => StorageOpError::Permission(msg),
            ObjectStoreClientError::Unauthenticated(msg) => StorageOpError::InvalidCredentials(msg),
            ObjectStoreClientError::Connection(msg) => StorageOpError::Connection(msg),
            ObjectStoreClientError::NotFound(msg) | ObjectStoreClientError::Service(msg) => {
                StorageOpError::CommandExecution(msg)
            }
        }
    }
}

/// The subset of the S3 API the analyzer needs.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn list_objects(
        &self,
        request: &ListObjectsRequest,
    ) -> Result<ListObjectsPage, ObjectStoreClientError>;

    /// Returns the upload id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<String, ObjectStoreClientError>;

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), ObjectStoreClientError>;
}

/// Builds one client per call from that call's configuration.
#[async_trait]
pub trait ObjectStoreClientFactory: Send + Sync {
    async fn client_for(&self, config: &S3Config) -> StorageResult<Arc<dyn ObjectStoreClient>>;
}
