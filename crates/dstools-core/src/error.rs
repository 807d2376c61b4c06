//! Error types module
//!
//! Every failure surfaced by dstools is one of the kinds in [`StorageOpError`].
//! Backend-specific errors are converted at the analyzer boundary; callers branch
//! on [`ErrorKind`] (or the stable codes in [`ErrorMetadata`]), never on message text.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for denied or unsupported operations
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error is presented by the CLI and HTTP layers.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Process exit code for the CLI
    fn exit_code(&self) -> i32;

    /// Machine-readable error code (e.g., "STORAGE_TIMEOUT")
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same request may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Failure category, detached from the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UnsupportedStorageType,
    InvalidCredentials,
    Connection,
    Permission,
    Timeout,
    NotSupported,
    CommandExecution,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageOpError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported storage type: {0}")]
    UnsupportedStorageType(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Storage connection error: {0}")]
    Connection(String),

    #[error("Storage permission error: {0}")]
    Permission(String),

    #[error("Storage operation timed out: {0}")]
    Timeout(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Command execution error: {0}")]
    CommandExecution(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageOpError>;

impl StorageOpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageOpError::Validation(_) => ErrorKind::Validation,
            StorageOpError::UnsupportedStorageType(_) => ErrorKind::UnsupportedStorageType,
            StorageOpError::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            StorageOpError::Connection(_) => ErrorKind::Connection,
            StorageOpError::Permission(_) => ErrorKind::Permission,
            StorageOpError::Timeout(_) => ErrorKind::Timeout,
            StorageOpError::NotSupported(_) => ErrorKind::NotSupported,
            StorageOpError::CommandExecution(_) => ErrorKind::CommandExecution,
        }
    }

    /// The message without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            StorageOpError::Validation(m)
            | StorageOpError::UnsupportedStorageType(m)
            | StorageOpError::InvalidCredentials(m)
            | StorageOpError::Connection(m)
            | StorageOpError::Permission(m)
            | StorageOpError::Timeout(m)
            | StorageOpError::NotSupported(m)
            | StorageOpError::CommandExecution(m) => m,
        }
    }

    /// Prefix the message with `context`, keeping the kind unchanged.
    pub fn with_context(self, context: impl Display) -> Self {
        let wrap = |m: String| format!("{}: {}", context, m);
        match self {
            StorageOpError::Validation(m) => StorageOpError::Validation(wrap(m)),
            StorageOpError::UnsupportedStorageType(m) => {
                StorageOpError::UnsupportedStorageType(wrap(m))
            }
            StorageOpError::InvalidCredentials(m) => StorageOpError::InvalidCredentials(wrap(m)),
            StorageOpError::Connection(m) => StorageOpError::Connection(wrap(m)),
            StorageOpError::Permission(m) => StorageOpError::Permission(wrap(m)),
            StorageOpError::Timeout(m) => StorageOpError::Timeout(wrap(m)),
            StorageOpError::NotSupported(m) => StorageOpError::NotSupported(wrap(m)),
            StorageOpError::CommandExecution(m) => StorageOpError::CommandExecution(wrap(m)),
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.error_code())
    }
}

/// Static metadata per kind: (http_status, exit_code, error_code, recoverable, suggested_action, log_level).
fn kind_static_metadata(
    kind: ErrorKind,
) -> (u16, i32, &'static str, bool, Option<&'static str>, LogLevel) {
    match kind {
        ErrorKind::Validation => (
            400,
            2,
            "VALIDATION_ERROR",
            false,
            Some("Check the location and parameters and try again"),
            LogLevel::Debug,
        ),
        ErrorKind::UnsupportedStorageType => (
            422,
            3,
            "UNSUPPORTED_STORAGE_TYPE",
            false,
            Some("Use one of: local, nfs, nfs4, ssh, s3"),
            LogLevel::Debug,
        ),
        ErrorKind::InvalidCredentials => (
            401,
            4,
            "INVALID_CREDENTIALS",
            false,
            Some("Check the credentials supplied for the selected storage type"),
            LogLevel::Warn,
        ),
        ErrorKind::Connection => (
            502,
            5,
            "STORAGE_CONNECTION_ERROR",
            true,
            Some("Check network reachability of the storage backend and retry"),
            LogLevel::Error,
        ),
        ErrorKind::Permission => (
            403,
            6,
            "STORAGE_PERMISSION_ERROR",
            false,
            Some("Request access to the location or use different credentials"),
            LogLevel::Warn,
        ),
        ErrorKind::Timeout => (
            504,
            7,
            "STORAGE_TIMEOUT",
            true,
            Some("Retry with a larger timeout or a narrower location"),
            LogLevel::Warn,
        ),
        ErrorKind::NotSupported => (
            501,
            8,
            "NOT_SUPPORTED",
            false,
            None,
            LogLevel::Debug,
        ),
        ErrorKind::CommandExecution => (
            500,
            9,
            "COMMAND_EXECUTION_ERROR",
            false,
            Some("Check that the path exists and the probe tools are installed"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for ErrorKind {
    fn http_status_code(&self) -> u16 {
        kind_static_metadata(*self).0
    }

    fn exit_code(&self) -> i32 {
        kind_static_metadata(*self).1
    }

    fn error_code(&self) -> &'static str {
        kind_static_metadata(*self).2
    }

    fn is_recoverable(&self) -> bool {
        kind_static_metadata(*self).3
    }

    fn suggested_action(&self) -> Option<&'static str> {
        kind_static_metadata(*self).4
    }

    fn log_level(&self) -> LogLevel {
        kind_static_metadata(*self).5
    }
}

impl ErrorMetadata for StorageOpError {
    fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }

    fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    fn error_code(&self) -> &'static str {
        self.kind().error_code()
    }

    fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }

    fn suggested_action(&self) -> Option<&'static str> {
        self.kind().suggested_action()
    }

    fn log_level(&self) -> LogLevel {
        self.kind().log_level()
    }
}
