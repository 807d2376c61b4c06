//! dstools Storage Library
//!
//! This crate provides the [`StorageAnalyzer`] trait and its three implementations
//! (local filesystem, SSH filesystem, S3-compatible object storage), plus the
//! [`UnifiedDispatcher`] that routes a storage-agnostic request to the right one.
//!
//! # Operations
//!
//! Every analyzer implements the same three operations:
//!
//! - **analyze**: recursive item count and total bytes
//! - **list_contents**: immediate subdirectories/prefixes or files/objects, capped
//! - **verify_access**: read/write eligibility, naming the mechanism used
//!
//! Analyzers hold no per-call state; clients and sessions are created per call.

pub mod batch;
pub mod dispatcher;
pub mod executor;
pub mod filesystem;
pub mod request;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use batch::{
    run_batch, BatchItemResult, BatchOperation, BatchOptions, BatchOutcome, BatchReport,
    BatchRequest, OperationOutput,
};
pub use dispatcher::UnifiedDispatcher;
pub use executor::{CommandExecutor, CommandOutput, LocalExecutor, SshExecutor, StorageCommand};
pub use filesystem::{LocalFilesystemAnalyzer, SshFilesystemAnalyzer};
pub use request::resolve_request;
pub use s3::{ObjectStoreClient, ObjectStoreClientFactory, S3Analyzer};
#[cfg(feature = "storage-s3")]
pub use s3::{AwsClientFactory, AwsS3Client};
pub use traits::StorageAnalyzer;

pub use dstools_core::{StorageOpError, StorageResult, StorageType};
