//! Storage analyzer abstraction
//!
//! This module defines the StorageAnalyzer trait that all storage backends must implement.

use async_trait::async_trait;
use dstools_core::{
    AccessOperation, AccessResult, ContentType, ListingResult, StorageConfig, StorageLocation,
    StorageMetrics, StorageResult, StorageType,
};
use std::time::Duration;

/// Storage analyzer trait
///
/// The local filesystem, SSH filesystem and S3 backends implement this trait so the
/// dispatcher can route by [`StorageType`] alone. Implementations receive a location
/// already resolved to their own type and a configuration already validated for it.
///
/// `timeout` is a budget for the backend's own sub-operations (connect timeouts, walk
/// deadlines); the dispatcher enforces the hard ceiling around the whole call.
#[async_trait]
pub trait StorageAnalyzer: Send + Sync {
    /// The storage type this analyzer serves.
    fn storage_type(&self) -> StorageType;

    /// Count items and sum their sizes, recursively.
    async fn analyze(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        timeout: Duration,
    ) -> StorageResult<StorageMetrics>;

    /// List immediate children of `content_type`, stopping after `max_items`.
    async fn list_contents(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        content_type: ContentType,
        max_items: usize,
        timeout: Duration,
    ) -> StorageResult<ListingResult>;

    /// Check whether `operation` is permitted on the location.
    ///
    /// Backends that cannot verify an operation return `StorageOpError::NotSupported`
    /// rather than `has_access = false`.
    async fn verify_access(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        operation: AccessOperation,
        timeout: Duration,
    ) -> StorageResult<AccessResult>;
}
