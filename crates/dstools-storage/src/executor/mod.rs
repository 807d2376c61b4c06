//! Command execution for filesystem backends
//!
//! The local and SSH filesystem backends share one narrow contract: run a
//! [`StorageCommand`] and hand back its output and exit status. Everything above this
//! layer (parsing, ACL evaluation, result shaping) is shared between them.
//!
//! Exit statuses follow one convention regardless of where the command ran:
//!
//! | status | meaning |
//! |--------|---------|
//! | 0      | success |
//! | 2      | location does not exist |
//! | 3      | location is not readable/traversable |
//! | 4      | location is not a directory |
//! | 127    | required tool is not installed |

mod local;
mod script;
mod ssh;

use async_trait::async_trait;
use dstools_core::{AclFlavor, ContentType, StorageOpError};
use std::time::Duration;
use thiserror::Error;

pub use local::LocalExecutor;
pub use script::{render_remote_script, shell_quote};
pub use ssh::SshExecutor;

pub const EXIT_NOT_FOUND: i32 = 2;
pub const EXIT_PERMISSION_DENIED: i32 = 3;
pub const EXIT_NOT_A_DIRECTORY: i32 = 4;
pub const EXIT_TOOL_MISSING: i32 = 127;

/// A filesystem query, independent of where it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCommand {
    /// Recursive regular-file count and byte total. Output: `count,bytes`.
    Metrics { path: String },
    /// Immediate children of one kind, at most `limit` names, one per line.
    ListChildren {
        path: String,
        content_type: ContentType,
        limit: usize,
    },
    /// Raw ACL listing from `getfacl` or `nfs4_getfacl`.
    Acl { path: String, flavor: AclFlavor },
}

impl StorageCommand {
    pub fn path(&self) -> &str {
        match self {
            StorageCommand::Metrics { path }
            | StorageCommand::ListChildren { path, .. }
            | StorageCommand::Acl { path, .. } => path,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            StorageCommand::Metrics { .. } => "metrics",
            StorageCommand::ListChildren { .. } => "list_children",
            StorageCommand::Acl { .. } => "acl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Map a non-zero exit status onto the error taxonomy.
    pub fn into_checked(self, path: &str) -> Result<Self, StorageOpError> {
        let stderr = self.stderr.trim().to_string();
        match self.exit_code {
            0 => Ok(self),
            EXIT_PERMISSION_DENIED => Err(StorageOpError::Permission(format!(
                "cannot read '{}'",
                path
            ))),
            EXIT_NOT_FOUND => Err(StorageOpError::CommandExecution(format!(
                "'{}' does not exist",
                path
            ))),
            EXIT_NOT_A_DIRECTORY => Err(StorageOpError::CommandExecution(format!(
                "'{}' is not a directory",
                path
            ))),
            _ if stderr.contains("Permission denied") => {
                Err(StorageOpError::Permission(format!("'{}': {}", path, stderr)))
            }
            code => Err(StorageOpError::CommandExecution(format!(
                "command exited with status {}: {}",
                code,
                if stderr.is_empty() { "no output" } else { stderr.as_str() }
            ))),
        }
    }
}

/// Failures that happen before a command produces an exit status.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unusable private key: {0}")]
    InvalidKey(String),

    #[error("execution failed: {0}")]
    Io(String),
}

impl From<ExecutorError> for StorageOpError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Connection(msg) => StorageOpError::Connection(msg),
            ExecutorError::Timeout(after) => {
                StorageOpError::Timeout(format!("command did not finish within {:?}", after))
            }
            ExecutorError::InvalidKey(msg) => StorageOpError::InvalidCredentials(msg),
            ExecutorError::Io(msg) => StorageOpError::CommandExecution(msg),
        }
    }
}

/// Runs filesystem queries on some host.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Where commands run, for logs and verification method names.
    fn describe(&self) -> String;

    async fn run(
        &self,
        command: &StorageCommand,
        timeout: Duration,
    ) -> Result<CommandOutput, ExecutorError>;
}
