//! dstools Core Library
//!
//! This crate provides the configuration model, location parsing, result models and
//! the error taxonomy shared by every dstools component. It performs no I/O beyond
//! reading process settings from the environment.

pub mod config;
pub mod error;
pub mod location;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    LocalConfig, LogFormat, S3AuthStrategy, S3Config, Settings, SshConfig, SshTarget,
    StorageConfig, DEFAULT_S3_REGION, DEFAULT_SSH_PORT, SSH_CONNECT_TIMEOUT_SECS,
};
pub use error::{ErrorKind, ErrorMetadata, LogLevel, StorageOpError, StorageResult};
pub use location::{LocationTarget, StorageLocation};
pub use models::{AccessResult, ListingResult, StorageMetrics};
pub use storage_types::{AccessOperation, AclFlavor, ContentType, StorageType};
